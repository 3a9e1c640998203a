use super::client::RpcError;
use super::port::{RawPort, RecvError};
use super::proto::{Message, Request, RequestId, Response};
use crate::data::{Demultiplexer, Event, EventBus, MetricsSchema, TransportEvent};
use crate::device::{DeviceId, SessionRegistry};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel;
use futures::channel::oneshot;
use serde_json::Value;

pub(crate) type ReplySender = oneshot::Sender<Result<Value, RpcError>>;

/// Requests from `Client` handles to the core thread.
pub(crate) enum Command {
    Call {
        request: Request,
        owner: Option<DeviceId>,
        reply: ReplySender,
    },
    /// Fail all calls issued on behalf of this device.
    Cancel(DeviceId),
    Close,
}

struct PendingCall {
    method: String,
    owner: Option<DeviceId>,
    reply: ReplySender,
}

#[derive(Debug)]
enum Exit {
    Closed,
    HandlesDropped,
    PortFailed(String),
}

/// Owns the port. Runs in a dedicated thread: every write to the socket
/// and every inbound message goes through here, in order.
pub(crate) struct ClientCore {
    port: Box<dyn RawPort>,
    commands: channel::Receiver<Command>,
    pending: HashMap<RequestId, PendingCall>,
    demux: Demultiplexer,
    registry: SessionRegistry,
    schema: MetricsSchema,
    bus: EventBus,
    connected: Arc<AtomicBool>,
}

impl ClientCore {
    pub fn new(
        port: Box<dyn RawPort>,
        commands: channel::Receiver<Command>,
        registry: SessionRegistry,
        schema: MetricsSchema,
        bus: EventBus,
        connected: Arc<AtomicBool>,
    ) -> ClientCore {
        ClientCore {
            port,
            commands,
            pending: HashMap::new(),
            demux: Demultiplexer::new(registry.clone(), schema.clone(), bus.clone()),
            registry,
            schema,
            bus,
            connected,
        }
    }

    pub fn run(mut self) {
        let exit = self.io_loop();
        self.shutdown(exit);
    }

    fn io_loop(&mut self) -> Exit {
        loop {
            loop {
                match self.commands.try_recv() {
                    Ok(Command::Call {
                        request,
                        owner,
                        reply,
                    }) => {
                        if let Err(reason) = self.send_request(request, owner, reply) {
                            return Exit::PortFailed(reason);
                        }
                    }
                    Ok(Command::Cancel(device)) => self.cancel_owned(&device),
                    Ok(Command::Close) => return Exit::Closed,
                    Err(channel::TryRecvError::Empty) => break,
                    Err(channel::TryRecvError::Disconnected) => return Exit::HandlesDropped,
                }
            }

            match self.port.recv() {
                Ok(text) => self.process_message(&text),
                Err(RecvError::NotReady) => {}
                Err(e) => return Exit::PortFailed(e.to_string()),
            }
        }
    }

    fn send_request(
        &mut self,
        request: Request,
        owner: Option<DeviceId>,
        reply: ReplySender,
    ) -> Result<(), String> {
        let text = match request.to_text() {
            Ok(text) => text,
            Err(e) => {
                let _ = reply.send(Err(RpcError::SendFailed(e.to_string())));
                return Ok(());
            }
        };
        if self.pending.contains_key(&request.id) {
            let _ = reply.send(Err(RpcError::SendFailed(format!(
                "request id {} already in flight",
                request.id
            ))));
            return Ok(());
        }
        tracing::trace!(id = request.id, method = %request.method, "request");
        self.pending.insert(
            request.id,
            PendingCall {
                method: request.method,
                owner,
                reply,
            },
        );
        if let Err(e) = self.port.send(&text) {
            if let Some(call) = self.pending.remove(&request.id) {
                let _ = call.reply.send(Err(RpcError::SendFailed(e.to_string())));
            }
            return Err(e.to_string());
        }
        Ok(())
    }

    fn process_message(&mut self, text: &str) {
        match Message::parse(text) {
            Ok(Message::Response(rep)) => self.resolve(rep),
            Ok(Message::Push(frame)) => self.demux.dispatch(&frame),
            Err(e) => {
                tracing::warn!("unparseable message from service: {}", e);
                self.bus
                    .publish(Event::Transport(TransportEvent::ProtocolError(e.to_string())));
            }
        }
    }

    fn resolve(&mut self, rep: Response) {
        let Some(call) = self.pending.remove(&rep.id) else {
            // Late reply to a cancelled call, or a reply meant for someone else.
            tracing::debug!(id = rep.id, "reply to unknown request dropped");
            return;
        };
        if let Err(err) = &rep.outcome {
            tracing::debug!(id = rep.id, method = %call.method, "request failed: {}", err);
        }
        // The caller may have stopped waiting; that is not our problem.
        let _ = call.reply.send(rep.outcome.map_err(RpcError::Request));
    }

    fn cancel_owned(&mut self, device: &str) {
        let ids: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, call)| call.owner.as_deref() == Some(device))
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            if let Some(call) = self.pending.remove(&id) {
                tracing::debug!(id, method = %call.method, device, "request cancelled");
                let _ = call.reply.send(Err(RpcError::Cancelled));
            }
        }
    }

    fn shutdown(&mut self, exit: Exit) {
        match &exit {
            Exit::Closed | Exit::HandlesDropped => tracing::info!("closing connection ({:?})", exit),
            Exit::PortFailed(reason) => tracing::error!("connection lost: {}", reason),
        }
        self.port.close();
        self.connected.store(false, Ordering::SeqCst);
        for (_, call) in self.pending.drain() {
            let _ = call.reply.send(Err(RpcError::ConnectionLost));
        }
        self.registry.clear();
        self.schema.clear();
        self.bus.publish(Event::Transport(TransportEvent::Closed));
    }
}
