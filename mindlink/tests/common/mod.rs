//! A scripted stand-in for the device-control service, talking to a real
//! `Client` over the in-memory channel port.

#![allow(dead_code)]

use crossbeam::channel::{self, Receiver, Sender};
use mindlink::data::{Event, EventBus, Subscription};
use mindlink::device::SessionRegistry;
use mindlink::rpc::port::{channel as port_channel, RecvError};
use mindlink::rpc::port::RawPort;
use mindlink::Client;
use serde_json::{json, Value};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(2);

/// Decides the reply to a request. `None` leaves the request unanswered;
/// the test can answer later through `FakeService::send`.
pub type Handler = Box<dyn FnMut(&Value) -> Option<Value> + Send>;

pub struct FakeService {
    pub client: Client,
    pub bus: EventBus,
    pub registry: SessionRegistry,
    outbound: Sender<Value>,
    requests: Receiver<Value>,
    thread: Option<JoinHandle<()>>,
}

pub fn reply(id: &Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

pub fn error_reply(id: &Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

impl FakeService {
    pub fn start(mut handler: Handler) -> FakeService {
        let (client_port, mut service_port) = port_channel::pair();
        let (outbound, outbound_rx) = channel::unbounded::<Value>();
        let (requests_tx, requests) = channel::unbounded::<Value>();

        let thread = thread::spawn(move || loop {
            for frame in outbound_rx.try_iter() {
                if service_port.send(&frame.to_string()).is_err() {
                    return;
                }
            }
            match service_port.recv_timeout(Duration::from_millis(1)) {
                Ok(text) => {
                    let request: Value = serde_json::from_str(&text).expect("request is JSON");
                    let answer = handler(&request);
                    let _ = requests_tx.send(request);
                    if let Some(answer) = answer {
                        if service_port.send(&answer.to_string()).is_err() {
                            return;
                        }
                    }
                }
                Err(RecvError::NotReady) => {}
                Err(_) => return,
            }
        });

        let bus = EventBus::default();
        let registry = SessionRegistry::new();
        let client = Client::from_port(Box::new(client_port), registry.clone(), bus.clone())
            .expect("client thread starts");
        FakeService {
            client,
            bus,
            registry,
            outbound,
            requests,
            thread: Some(thread),
        }
    }

    /// A service that never answers on its own.
    pub fn silent() -> FakeService {
        FakeService::start(Box::new(|_| None))
    }

    /// Sends a reply or a push frame to the client.
    pub fn send(&self, frame: Value) {
        self.outbound.send(frame).expect("service thread is running");
    }

    /// The next request the client sent.
    pub fn next_request(&self) -> Value {
        self.requests
            .recv_timeout(WAIT)
            .expect("client sent a request")
    }

    /// Every request received so far and not yet taken.
    pub fn drain_requests(&self) -> Vec<Value> {
        self.requests.try_iter().collect()
    }

    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe_all()
    }

    /// Waits for the first event matching `pred`.
    pub fn wait_for<F: Fn(&Event) -> bool>(sub: &Subscription, pred: F) -> Event {
        loop {
            let event = sub.recv_timeout(WAIT).expect("event arrived");
            if pred(&event) {
                return event;
            }
        }
    }
}

impl Drop for FakeService {
    fn drop(&mut self) {
        self.client.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
