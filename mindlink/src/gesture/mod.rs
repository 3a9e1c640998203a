//! Turns mental commands and head motion into grid navigation and
//! hold-to-confirm selections, independently for every device.

mod config;
mod engine;
pub mod grid;
mod hold;
mod tilt;

pub use config::EngineConfig;
pub use engine::{Phase, SelectionEngine, SelectionOutcome, SelectionSnapshot};
pub use grid::{Direction, Grid};
pub use hold::{HoldChange, HoldTracker};
pub use tilt::{TiltAxes, TiltTracker};
