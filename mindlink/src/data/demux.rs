//! Stream demultiplexer
//!
//! Every push frame that is not a reply is handed to `Demultiplexer::dispatch`
//! on the client core thread. The frame's shape picks exactly one handler,
//! tested in this order: `com`, `mot`, `met`, `sys`, `warning`, `error`.
//! Stream frames are tied to a device through their `sid` and the session
//! registry, decoded, and published on the event bus.
//!
//! Nothing in here may fail the delivery path. Malformed frames, frames for
//! sessions we do not know, and metrics frames that arrive before their
//! schema are logged and dropped.

use super::bus::EventBus;
use super::event::{
    Event, MentalCommandEvent, SessionEvent, SystemEvent, TransportEvent, WarningEvent,
};
use super::metrics::{MetricsRow, MetricsSchema};
use super::motion::MotionSample;
use crate::device::{SessionRegistry, SessionStatus, UNKNOWN_DEVICE};
use crate::rpc::proto::{RpcErrorPayload, StreamKind, WarningCode};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum DemuxError {
    #[error("no session registered for sid '{0}'")]
    UnresolvedSession(String),
    #[error("metrics frame before the metrics schema is known")]
    SchemaNotReady,
    #[error("malformed {stream} frame: {reason}")]
    Malformed {
        stream: &'static str,
        reason: &'static str,
    },
}

fn malformed(stream: &'static str, reason: &'static str) -> DemuxError {
    DemuxError::Malformed { stream, reason }
}

pub struct Demultiplexer {
    registry: SessionRegistry,
    schema: MetricsSchema,
    bus: EventBus,
}

impl Demultiplexer {
    pub fn new(registry: SessionRegistry, schema: MetricsSchema, bus: EventBus) -> Demultiplexer {
        Demultiplexer {
            registry,
            schema,
            bus,
        }
    }

    /// Decodes a push frame and publishes the resulting events. Never fails.
    pub fn dispatch(&self, frame: &Map<String, Value>) {
        match self.decode(frame) {
            Ok(events) => {
                for event in events {
                    tracing::trace!("{}", event);
                    self.bus.publish(event);
                }
            }
            Err(DemuxError::SchemaNotReady) => {
                tracing::debug!("metrics frame dropped, schema not captured yet");
            }
            Err(e) => {
                tracing::warn!("frame dropped: {}", e);
            }
        }
    }

    /// Decodes a push frame into the events it produces, without publishing.
    /// Unknown frame shapes produce no events.
    pub fn decode(&self, frame: &Map<String, Value>) -> Result<Vec<Event>, DemuxError> {
        for kind in StreamKind::ALL {
            if let Some(data) = frame.get(kind.key()) {
                return self.decode_stream(kind, data, frame).map(|e| vec![e]);
            }
        }
        if let Some(warning) = frame.get("warning") {
            return Ok(self.decode_warning(warning));
        }
        if let Some(error) = frame.get("error") {
            let err = RpcErrorPayload::from_value(error);
            tracing::error!("service error outside of any request: {}", err);
            return Ok(vec![Event::Transport(TransportEvent::ProtocolError(
                err.to_string(),
            ))]);
        }
        tracing::trace!("ignoring frame with unknown shape: {:?}", frame.keys().collect::<Vec<_>>());
        Ok(vec![])
    }

    fn resolve(&self, stream: &'static str, frame: &Map<String, Value>) -> Result<String, DemuxError> {
        let sid = frame
            .get("sid")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(stream, "missing sid"))?;
        let device = self.registry.resolve_device(sid);
        if device == UNKNOWN_DEVICE {
            return Err(DemuxError::UnresolvedSession(sid.to_string()));
        }
        Ok(device)
    }

    fn decode_stream(
        &self,
        kind: StreamKind,
        data: &Value,
        frame: &Map<String, Value>,
    ) -> Result<Event, DemuxError> {
        let stream = kind.key();
        let values = data
            .as_array()
            .ok_or_else(|| malformed(stream, "payload is not an array"))?;
        let time = frame.get("time").and_then(Value::as_f64).unwrap_or(0.0);
        let device = self.resolve(stream, frame)?;

        match kind {
            StreamKind::Command => {
                let label = values
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed(stream, "missing command label"))?;
                let power = match values.get(1) {
                    Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                    Some(Value::Null) => 0.0,
                    _ => return Err(malformed(stream, "missing command power")),
                };
                Ok(Event::Command(MentalCommandEvent {
                    device,
                    label: label.to_string(),
                    power: power.clamp(0.0, 1.0),
                    time,
                }))
            }
            StreamKind::Motion => {
                let sample = MotionSample::from_values(values)
                    .ok_or_else(|| malformed(stream, "too few numeric fields"))?;
                Ok(Event::Motion(sample.decode(&device, time)))
            }
            StreamKind::Metrics => {
                let columns = self.schema.columns().ok_or(DemuxError::SchemaNotReady)?;
                Ok(Event::Metrics(
                    MetricsRow::map(&columns, values).to_event(&device, time),
                ))
            }
            StreamKind::System => {
                if values.len() < 2 {
                    return Err(malformed(stream, "expected [eventType, eventName, ...]"));
                }
                let text = |v: &Value| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Ok(Event::System(SystemEvent {
                    device,
                    event_type: text(&values[0]),
                    event_name: text(&values[1]),
                    args: values[2..].to_vec(),
                    time,
                }))
            }
        }
    }

    /// Warnings that name a session or headset we track also mark that
    /// device's session as failed.
    fn decode_warning(&self, warning: &Value) -> Vec<Event> {
        let code = warning
            .get("code")
            .and_then(Value::as_i64)
            .and_then(|c| i32::try_from(c).ok())
            .map(WarningCode::from)
            .unwrap_or(WarningCode::Unknown(-1));
        let message = warning.get("message").cloned().unwrap_or(Value::Null);
        tracing::warn!("service warning {:?}: {}", code, message);

        let mut events = vec![Event::Warning(WarningEvent {
            code,
            message: message.clone(),
        })];

        let failed_device = match code {
            WarningCode::StreamStopped | WarningCode::SessionAutoClosed => message
                .get("sessionId")
                .and_then(Value::as_str)
                .map(|sid| self.registry.resolve_device(sid))
                .filter(|d| d != UNKNOWN_DEVICE),
            WarningCode::HeadsetDisconnectedTimeout => message
                .get("headsetId")
                .and_then(Value::as_str)
                .filter(|d| self.registry.status(d).is_some())
                .map(str::to_string),
            _ => None,
        };
        if let Some(device) = failed_device {
            self.registry.set_status(&device, SessionStatus::Error);
            events.push(Event::Session(SessionEvent {
                device,
                status: Some(SessionStatus::Error),
            }));
        }
        events
    }
}
