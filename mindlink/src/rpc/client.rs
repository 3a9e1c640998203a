//! Client
//!
//! A `Client` multiplexes any number of device sessions over one connection
//! to the device-control service. The connection itself is owned by a
//! dedicated thread (see `client_core`); `Client` handles are cheap to clone
//! and talk to that thread over a channel.
//!
//! `call()` never blocks. It returns a `PendingCall`, which is a `Future`
//! and can also be waited on synchronously. Every call resolves exactly
//! once: with the reply, with the service's error, or with
//! `RpcError::ConnectionLost` if the connection goes away first. The client
//! never times out a call on its own.
//!
//! Push frames are decoded by the demultiplexer and published on the
//! `EventBus` the client was created with.

use super::client_core::{ClientCore, Command};
use super::port::{self, RawPort, TransportError};
use super::proto::{Request, RequestId, RpcErrorPayload};
use crate::config::ClientConfig;
use crate::data::{Event, EventBus, MetricsSchema, TransportEvent};
use crate::device::SessionRegistry;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;

use crossbeam::channel;
use futures::channel::oneshot;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// The service answered with an error.
    #[error("service error: {0}")]
    Request(RpcErrorPayload),
    /// The connection closed before the reply arrived.
    #[error("connection lost")]
    ConnectionLost,
    /// The call belonged to a device that was disconnected.
    #[error("call cancelled")]
    Cancelled,
    #[error("request could not be sent: {0}")]
    SendFailed(String),
    /// The reply did not have the expected shape.
    #[error("unexpected reply: {0}")]
    InvalidReply(String),
}

/// An in-flight request.
pub struct PendingCall {
    id: RequestId,
    method: String,
    rx: oneshot::Receiver<Result<Value, RpcError>>,
}

impl PendingCall {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Blocks until the call resolves.
    pub fn wait(self) -> Result<Value, RpcError> {
        futures::executor::block_on(self)
    }

    /// Returns the outcome if the call already resolved.
    pub fn try_result(&mut self) -> Option<Result<Value, RpcError>> {
        match self.rx.try_recv() {
            Ok(Some(res)) => Some(res),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(RpcError::ConnectionLost)),
        }
    }
}

impl Future for PendingCall {
    type Output = Result<Value, RpcError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(res)) => Poll::Ready(res),
            // The core dropped the reply without answering: it is gone.
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(RpcError::ConnectionLost)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[derive(Clone)]
pub struct Client {
    commands: channel::Sender<Command>,
    next_id: Arc<AtomicU64>,
    connected: Arc<AtomicBool>,
    registry: SessionRegistry,
    schema: MetricsSchema,
    bus: EventBus,
}

impl Client {
    /// Connects to the service at `config.url`. Returns once the socket is
    /// open and the handshake is done.
    pub fn connect(
        config: &ClientConfig,
        registry: SessionRegistry,
        bus: EventBus,
    ) -> Result<Client, TransportError> {
        let port = port::open(&config.url, config.poll_interval)?;
        tracing::info!(url = %config.url, "connected to device-control service");
        Client::from_port(port, registry, bus)
    }

    /// Runs a client over an already open port.
    pub fn from_port(
        port: Box<dyn RawPort>,
        registry: SessionRegistry,
        bus: EventBus,
    ) -> Result<Client, TransportError> {
        let (tx, rx) = channel::unbounded();
        let schema = MetricsSchema::new();
        let connected = Arc::new(AtomicBool::new(true));
        let core = ClientCore::new(
            port,
            rx,
            registry.clone(),
            schema.clone(),
            bus.clone(),
            connected.clone(),
        );
        bus.publish(Event::Transport(TransportEvent::Connected));
        thread::Builder::new()
            .name("mindlink-client".to_string())
            .spawn(move || core.run())?;
        Ok(Client {
            commands: tx,
            next_id: Arc::new(AtomicU64::new(1)),
            connected,
            registry,
            schema,
            bus,
        })
    }

    fn submit(&self, owner: Option<&str>, method: &str, params: Value) -> PendingCall {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        let cmd = Command::Call {
            request: Request::new(id, method, params),
            owner: owner.map(str::to_string),
            reply,
        };
        if self.commands.send(cmd).is_err() {
            // The core is gone and the reply sender was dropped with the
            // command: the call resolves as ConnectionLost.
            tracing::debug!(id, method, "call on closed client");
        }
        PendingCall {
            id,
            method: method.to_string(),
            rx,
        }
    }

    /// Issues a request. `params` may be `Value::Null` for none.
    pub fn call(&self, method: &str, params: Value) -> PendingCall {
        self.submit(None, method, params)
    }

    /// Issues a request on behalf of `device`. It fails fast with
    /// `RpcError::Cancelled` if the device is disconnected before it resolves.
    pub fn call_for(&self, device: &str, method: &str, params: Value) -> PendingCall {
        self.submit(Some(device), method, params)
    }

    /// Fails every pending call issued with `call_for(device, ..)`.
    pub fn cancel_device_calls(&self, device: &str) {
        let _ = self.commands.send(Command::Cancel(device.to_string()));
    }

    /// Closes the connection. Pending calls fail with `ConnectionLost`,
    /// the session registry is cleared and `TransportEvent::Closed` is
    /// published.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn metrics_schema(&self) -> &MetricsSchema {
        &self.schema
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
