pub mod config;
pub mod data;
pub mod device;
pub mod gesture;
pub mod rpc;

pub use config::{ClientConfig, Credentials};
pub use data::{Event, EventBus};
pub use device::{HeadsetManager, IdentityRegistry, SessionRegistry};
pub use gesture::{EngineConfig, SelectionEngine};
pub use rpc::Client;
