mod client;
mod client_core;
pub mod port;
pub mod proto;

pub use client::{Client, PendingCall, RpcError};
pub use port::TransportError;
pub use proto::{RequestId, RpcErrorCode, RpcErrorPayload, StreamKind};
