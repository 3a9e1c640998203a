//! Headset workflow
//!
//! The service-level sequence that turns a discovered headset into a
//! streaming session: access request, authorization, device connect,
//! session creation and stream subscription, plus the matching teardown.
//! All calls go through the shared `Client`; the manager only keeps the
//! authorization token and keeps the `SessionRegistry` and `MetricsSchema`
//! up to date.
//!
//! Every method is async and resolves when the service answered. Tools
//! drive them with `futures::executor::block_on`.

use super::headset::{ConnectionStatus, Headset};
use super::registry::SessionStatus;
use crate::config::Credentials;
use crate::data::{Event, SessionEvent};
use crate::rpc::{Client, RpcError, StreamKind};

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("headset {0} not available")]
    NoHeadset(String),
    #[error("subscription to '{stream}' rejected: {message}")]
    SubscriptionRejected { stream: String, message: String },
    #[error("not authorized: {0}")]
    NotAuthorized(String),
}

/// A stream the service refused in a `subscribe` acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedStream {
    pub stream: String,
    pub code: i64,
    pub message: String,
}

/// Parsed `subscribe` result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscribeAck {
    /// Accepted streams with their column names, if the service sent any.
    pub accepted: Vec<(String, Vec<String>)>,
    pub rejected: Vec<RejectedStream>,
}

impl SubscribeAck {
    pub fn from_value(v: &Value) -> SubscribeAck {
        let entries = |key: &str| {
            v.get(key)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };
        let name = |e: &Value| {
            e.get("streamName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let accepted = entries("success")
            .iter()
            .map(|e| {
                let cols = e
                    .get("cols")
                    .and_then(Value::as_array)
                    .map(|cols| {
                        cols.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                (name(e), cols)
            })
            .collect();
        let rejected = entries("failure")
            .iter()
            .map(|e| RejectedStream {
                stream: name(e),
                code: e.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: e
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect();
        SubscribeAck { accepted, rejected }
    }

    pub fn columns(&self, stream: StreamKind) -> Option<&[String]> {
        self.accepted
            .iter()
            .find(|(name, _)| name == stream.key())
            .map(|(_, cols)| cols.as_slice())
    }
}

#[derive(Clone)]
pub struct HeadsetManager {
    client: Client,
    credentials: Credentials,
    streams: Vec<StreamKind>,
    connect_timeout: Duration,
    token: Arc<RwLock<Option<String>>>,
}

impl HeadsetManager {
    /// A manager subscribing every stream on `open`.
    pub fn new(client: Client, credentials: Credentials) -> HeadsetManager {
        HeadsetManager {
            client,
            credentials,
            streams: StreamKind::ALL.to_vec(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_streams(mut self, streams: &[StreamKind]) -> HeadsetManager {
        self.streams = streams.to_vec();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> HeadsetManager {
        self.connect_timeout = timeout;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn publish_status(&self, device: &str, status: Option<SessionStatus>) {
        self.client.bus().publish(Event::Session(SessionEvent {
            device: device.to_string(),
            status,
        }));
    }

    fn token(&self) -> Result<String, WorkflowError> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| WorkflowError::NotAuthorized("authorize() has not completed".into()))
    }

    /// Requests access for the application, then authorizes it. Returns the
    /// token used by every later session call.
    pub async fn authorize(&self) -> Result<String, WorkflowError> {
        let creds = &self.credentials;
        let access = self
            .client
            .call(
                "requestAccess",
                json!({"clientId": creds.client_id, "clientSecret": creds.client_secret}),
            )
            .await?;
        if access.get("accessGranted").and_then(Value::as_bool) == Some(false) {
            let message = access
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("access not granted")
                .to_string();
            return Err(WorkflowError::NotAuthorized(message));
        }

        let mut params = json!({
            "clientId": creds.client_id,
            "clientSecret": creds.client_secret,
            "debit": creds.debit,
        });
        if let Some(license) = &creds.license {
            params["license"] = json!(license);
        }
        let reply = self.client.call("authorize", params).await?;
        let token = reply
            .get("cortexToken")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::InvalidReply("authorize: no cortexToken".into()))?
            .to_string();
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        tracing::info!(client_id = %creds.client_id, "application authorized");
        Ok(token)
    }

    /// Asks the service to rescan for headsets.
    pub async fn refresh(&self) -> Result<(), WorkflowError> {
        self.client
            .call("controlDevice", json!({"command": "refresh"}))
            .await?;
        Ok(())
    }

    pub async fn query_headsets(&self) -> Result<Vec<Headset>, WorkflowError> {
        let reply = self.client.call("queryHeadsets", Value::Null).await?;
        Ok(Headset::list_from_value(&reply))
    }

    async fn query_headset(&self, device: &str) -> Result<Option<Headset>, WorkflowError> {
        let reply = self
            .client
            .call_for(device, "queryHeadsets", json!({"id": device}))
            .await?;
        Ok(Headset::list_from_value(&reply)
            .into_iter()
            .find(|h| h.id == device))
    }

    /// Asks the service to connect `device`. The headset is usually not
    /// connected yet when this returns; see `wait_connected`.
    pub async fn connect_headset(&self, device: &str) -> Result<(), WorkflowError> {
        self.client
            .registry()
            .set_status(device, SessionStatus::Connecting);
        self.publish_status(device, Some(SessionStatus::Connecting));
        self.client
            .call_for(
                device,
                "controlDevice",
                json!({"command": "connect", "headset": device}),
            )
            .await?;
        tracing::info!(device, "connecting headset");
        Ok(())
    }

    /// Polls the service until `device` reports connected.
    pub async fn wait_connected(&self, device: &str) -> Result<Headset, WorkflowError> {
        let deadline = Instant::now() + self.connect_timeout;
        loop {
            match self.query_headset(device).await? {
                Some(h) if h.status == ConnectionStatus::Ready => return Ok(h),
                Some(h) if h.status == ConnectionStatus::Error => {
                    return Err(WorkflowError::NoHeadset(device.to_string()))
                }
                _ => {}
            }
            if Instant::now() >= deadline {
                tracing::warn!(device, "headset did not connect in time");
                return Err(WorkflowError::NoHeadset(device.to_string()));
            }
            futures_timer::Delay::new(CONNECT_POLL_INTERVAL).await;
        }
    }

    /// Opens an active session on a connected headset and registers it.
    pub async fn create_session(&self, device: &str) -> Result<String, WorkflowError> {
        let token = self.token()?;
        let reply = self
            .client
            .call_for(
                device,
                "createSession",
                json!({"cortexToken": token, "headset": device, "status": "active"}),
            )
            .await?;
        let session = reply
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::InvalidReply("createSession: no session id".into()))?
            .to_string();
        self.client.registry().put(device, &session);
        self.publish_status(device, Some(SessionStatus::Ready));
        tracing::info!(device, session = %session, "session created");
        Ok(session)
    }

    /// Subscribes the session of `device` to `streams`. The metrics column
    /// list from the acknowledgment replaces the client's metrics schema.
    pub async fn subscribe(
        &self,
        device: &str,
        streams: &[StreamKind],
    ) -> Result<SubscribeAck, WorkflowError> {
        let token = self.token()?;
        let session = self
            .client
            .registry()
            .session(device)
            .ok_or_else(|| WorkflowError::NoHeadset(device.to_string()))?;
        let names: Vec<&str> = streams.iter().map(StreamKind::key).collect();
        let reply = self
            .client
            .call_for(
                device,
                "subscribe",
                json!({"cortexToken": token, "session": session, "streams": names}),
            )
            .await?;
        let ack = SubscribeAck::from_value(&reply);
        if let Some(cols) = ack.columns(StreamKind::Metrics) {
            tracing::debug!(device, columns = cols.len(), "metrics schema captured");
            self.client.metrics_schema().replace(cols.to_vec());
        }
        if let Some(rejected) = ack.rejected.first() {
            return Err(WorkflowError::SubscriptionRejected {
                stream: rejected.stream.clone(),
                message: rejected.message.clone(),
            });
        }
        Ok(ack)
    }

    pub async fn unsubscribe(
        &self,
        device: &str,
        streams: &[StreamKind],
    ) -> Result<(), WorkflowError> {
        let token = self.token()?;
        let session = self
            .client
            .registry()
            .session(device)
            .ok_or_else(|| WorkflowError::NoHeadset(device.to_string()))?;
        let names: Vec<&str> = streams.iter().map(StreamKind::key).collect();
        self.client
            .call_for(
                device,
                "unsubscribe",
                json!({"cortexToken": token, "session": session, "streams": names}),
            )
            .await?;
        Ok(())
    }

    async fn open_steps(&self, device: &str) -> Result<String, WorkflowError> {
        self.connect_headset(device).await?;
        self.wait_connected(device).await?;
        let session = self.create_session(device).await?;
        self.subscribe(device, &self.streams).await?;
        Ok(session)
    }

    /// Connects `device`, opens its session and subscribes the configured
    /// streams. On failure the device is left in `SessionStatus::Error`.
    pub async fn open(&self, device: &str) -> Result<String, WorkflowError> {
        match self.open_steps(device).await {
            Ok(session) => Ok(session),
            Err(e) => {
                tracing::warn!(device, "could not open headset: {}", e);
                self.client
                    .registry()
                    .set_status(device, SessionStatus::Error);
                self.publish_status(device, Some(SessionStatus::Error));
                Err(e)
            }
        }
    }

    /// Tears down the session of `device` only. Its pending calls fail with
    /// `RpcError::Cancelled`; other devices and the connection are left
    /// alone. Service-side failures are logged, the local state is dropped
    /// regardless.
    pub async fn disconnect_headset(&self, device: &str) {
        self.client.cancel_device_calls(device);
        if let (Some(session), Ok(token)) = (self.client.registry().session(device), self.token()) {
            let close = self
                .client
                .call(
                    "updateSession",
                    json!({"cortexToken": token, "session": session, "status": "close"}),
                )
                .await;
            if let Err(e) = close {
                tracing::warn!(device, "closing session failed: {}", e);
            }
        }
        let disconnect = self
            .client
            .call(
                "controlDevice",
                json!({"command": "disconnect", "headset": device}),
            )
            .await;
        if let Err(e) = disconnect {
            tracing::warn!(device, "disconnecting headset failed: {}", e);
        }
        self.client.registry().remove(device);
        self.publish_status(device, None);
        tracing::info!(device, "headset disconnected");
    }

    /// Closes the connection for every device.
    pub fn close(&self) {
        self.client.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe_acknowledgment() {
        let ack = SubscribeAck::from_value(&json!({
            "success": [
                {"streamName": "met", "cols": ["eng.isActive", "eng", "foc"], "sid": "s1"},
                {"streamName": "com", "cols": ["act", "pow"], "sid": "s1"}
            ],
            "failure": [
                {"streamName": "mot", "code": -32016, "message": "stream unavailable"}
            ]
        }));
        assert_eq!(
            ack.columns(StreamKind::Metrics),
            Some(&["eng.isActive".to_string(), "eng".into(), "foc".into()][..])
        );
        assert_eq!(ack.columns(StreamKind::System), None);
        assert_eq!(ack.rejected.len(), 1);
        assert_eq!(ack.rejected[0].stream, "mot");
        assert_eq!(ack.rejected[0].code, -32016);
    }

    #[test]
    fn empty_acknowledgment() {
        let ack = SubscribeAck::from_value(&Value::Null);
        assert!(ack.accepted.is_empty());
        assert!(ack.rejected.is_empty());
    }
}
