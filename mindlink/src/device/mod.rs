mod headset;
mod headsets;
pub mod identity;
mod registry;

pub use headset::{ConnectionStatus, Headset};
pub use headsets::{HeadsetManager, RejectedStream, SubscribeAck, WorkflowError, DEFAULT_CONNECT_TIMEOUT};
pub use identity::{IdentityRegistry, Rgb};
pub use registry::{DeviceId, SessionEntry, SessionRegistry, SessionStatus, UNKNOWN_DEVICE};
