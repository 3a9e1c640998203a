//! Channel Port
//!
//! An in-memory `RawPort` built on a pair of crossbeam channels. `pair()`
//! returns both ends: one is handed to a `Client`, the other is driven by
//! whatever plays the part of the service (a simulator or a test).

use super::{RawPort, RecvError, SendError, DEFAULT_POLL_INTERVAL};
use crossbeam::channel::{self, RecvTimeoutError};
use std::time::Duration;

pub struct Port {
    tx: Option<channel::Sender<String>>,
    rx: channel::Receiver<String>,
    poll_interval: Duration,
}

/// Creates two connected ports. Text sent on one is received on the other.
pub fn pair() -> (Port, Port) {
    let (a_tx, b_rx) = channel::unbounded();
    let (b_tx, a_rx) = channel::unbounded();
    (
        Port {
            tx: Some(a_tx),
            rx: a_rx,
            poll_interval: DEFAULT_POLL_INTERVAL,
        },
        Port {
            tx: Some(b_tx),
            rx: b_rx,
            poll_interval: DEFAULT_POLL_INTERVAL,
        },
    )
}

impl Port {
    /// Blocks until a message arrives or the peer disconnects.
    pub fn recv_blocking(&self) -> Result<String, RecvError> {
        self.rx.recv().map_err(|_| RecvError::Disconnected)
    }

    /// Waits at most `timeout` for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<String, RecvError> {
        match self.rx.recv_timeout(timeout) {
            Ok(text) => Ok(text),
            Err(RecvTimeoutError::Timeout) => Err(RecvError::NotReady),
            Err(RecvTimeoutError::Disconnected) => Err(RecvError::Disconnected),
        }
    }
}

impl RawPort for Port {
    fn recv(&mut self) -> Result<String, RecvError> {
        self.recv_timeout(self.poll_interval)
    }

    fn send(&mut self, text: &str) -> Result<(), SendError> {
        match &self.tx {
            Some(tx) => tx
                .send(text.to_string())
                .map_err(|_| SendError::Disconnected),
            None => Err(SendError::Disconnected),
        }
    }

    fn close(&mut self) {
        self.tx = None;
    }
}
