//! Raw ports
//!
//! A `RawPort` moves whole JSON text messages to and from the device-control
//! service. The client core owns exactly one of them and drives it from its
//! own thread, so ports only need to be `Send`.
//!
//! Two implementations exist:
//! - `ws::Port`, a websocket (`ws://` or `wss://`), which is how the real
//!   service is reached.
//! - `channel::Port`, an in-memory pair of crossbeam channels, used to plug
//!   a simulated service directly into a client.

pub mod channel;
mod ws;

use std::io;
use std::time::Duration;

/// Default port of the device-control service.
pub const DEFAULT_SERVICE_PORT: u16 = 6868;

/// How long `recv()` may block waiting for a message before returning
/// `RecvError::NotReady`. This bounds the latency of outgoing requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Failures to establish, or to keep, the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid service url '{0}'")]
    InvalidUrl(String),
    #[error("unsupported url scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("tls setup failed: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("websocket handshake failed: {0}")]
    Handshake(String),
    #[error("connection closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    /// No message available at this time.
    #[error("no message available")]
    NotReady,
    /// The other end went away.
    #[error("port disconnected")]
    Disconnected,
    #[error("io error: {0}")]
    IO(#[from] io::Error),
    #[error("websocket error: {0}")]
    Socket(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("port disconnected")]
    Disconnected,
    #[error("io error: {0}")]
    IO(#[from] io::Error),
    #[error("websocket error: {0}")]
    Socket(String),
}

/// Generic interface to the socket carrying the protocol.
pub trait RawPort: Send {
    /// Returns the next text message. Blocks for at most the port's poll
    /// interval, returning `RecvError::NotReady` if nothing arrived.
    /// Any other error means the port is dead and must be dropped.
    fn recv(&mut self) -> Result<String, RecvError>;

    /// Sends one text message in full.
    fn send(&mut self, text: &str) -> Result<(), SendError>;

    /// Initiates an orderly close. Further sends fail.
    fn close(&mut self) {}
}

/// Opens a port to the service at `url`. Supported schemes are `ws` and
/// `wss`; a bare `host[:port]` is treated as `wss`.
pub fn open(url: &str, poll_interval: Duration) -> Result<Box<dyn RawPort>, TransportError> {
    let full = if url.contains("://") {
        url.to_string()
    } else {
        format!("wss://{}", url)
    };
    let parsed = url::Url::parse(&full).map_err(|_| TransportError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(Box::new(ws::Port::connect(&parsed, poll_interval)?)),
        other => Err(TransportError::UnsupportedScheme(other.to_string())),
    }
}
