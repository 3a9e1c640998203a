use crate::device::{DeviceId, SessionStatus};
use crate::rpc::proto::WarningCode;
use serde_json::Value;

/// Label of the mental command used for hold-to-confirm.
pub const PUSH_COMMAND: &str = "push";

#[derive(Debug, Clone, PartialEq)]
pub struct MentalCommandEvent {
    pub device: DeviceId,
    pub label: String,
    /// Classifier confidence, in [0, 1].
    pub power: f64,
    pub time: f64,
}

impl MentalCommandEvent {
    pub fn is_push(&self) -> bool {
        self.label == PUSH_COMMAND
    }
}

/// Decoded head motion. Angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionEvent {
    pub device: DeviceId,
    pub pitch: f64,
    pub roll: f64,
    pub rotation: f64,
    pub acceleration: [f64; 3],
    pub magnetometer: [f64; 3],
    pub quaternion: [f64; 4],
    pub counter: u64,
    pub interpolated: bool,
    pub time: f64,
}

/// Performance metrics, each in [0, 1]. A metric the service flagged as
/// invalid for this sample is reported as 0.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMetricsEvent {
    pub device: DeviceId,
    pub excitement: f64,
    pub engagement: f64,
    pub stress: f64,
    pub relaxation: f64,
    pub interest: f64,
    pub focus: f64,
    pub time: f64,
}

/// Training and system notifications (`[eventType, eventName, ...args]`).
#[derive(Debug, Clone, PartialEq)]
pub struct SystemEvent {
    pub device: DeviceId,
    pub event_type: String,
    pub event_name: String,
    pub args: Vec<Value>,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WarningEvent {
    pub code: WarningCode,
    pub message: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    /// The socket is gone. All pending calls were rejected and all sessions
    /// dropped.
    Closed,
    /// Something unparseable arrived. The connection is still up.
    ProtocolError(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub device: DeviceId,
    /// None once the device is disconnected and its session is gone.
    pub status: Option<SessionStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Command,
    Motion,
    Metrics,
    System,
    Warning,
    Session,
    Transport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Command(MentalCommandEvent),
    Motion(MotionEvent),
    Metrics(PerformanceMetricsEvent),
    System(SystemEvent),
    Warning(WarningEvent),
    Session(SessionEvent),
    Transport(TransportEvent),
}

impl Event {
    pub fn category(&self) -> Category {
        match self {
            Event::Command(_) => Category::Command,
            Event::Motion(_) => Category::Motion,
            Event::Metrics(_) => Category::Metrics,
            Event::System(_) => Category::System,
            Event::Warning(_) => Category::Warning,
            Event::Session(_) => Category::Session,
            Event::Transport(_) => Category::Transport,
        }
    }

    /// The device this event belongs to, if it is device specific.
    pub fn device(&self) -> Option<&str> {
        match self {
            Event::Command(e) => Some(&e.device),
            Event::Motion(e) => Some(&e.device),
            Event::Metrics(e) => Some(&e.device),
            Event::System(e) => Some(&e.device),
            Event::Session(e) => Some(&e.device),
            Event::Warning(_) | Event::Transport(_) => None,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Command(e) => write!(f, "COM({}) {} {:.3} @{:.3}", e.device, e.label, e.power, e.time),
            Event::Motion(e) => write!(
                f,
                "MOT({}) pitch: {:.1} roll: {:.1} rotation: {:.1} acc: [{:.2}, {:.2}, {:.2}] @{:.3}",
                e.device,
                e.pitch,
                e.roll,
                e.rotation,
                e.acceleration[0],
                e.acceleration[1],
                e.acceleration[2],
                e.time
            ),
            Event::Metrics(e) => write!(
                f,
                "MET({}) exc: {:.2} eng: {:.2} str: {:.2} rel: {:.2} int: {:.2} foc: {:.2} @{:.3}",
                e.device,
                e.excitement,
                e.engagement,
                e.stress,
                e.relaxation,
                e.interest,
                e.focus,
                e.time
            ),
            Event::System(e) => write!(
                f,
                "SYS({}) {} {} {:?} @{:.3}",
                e.device, e.event_type, e.event_name, e.args, e.time
            ),
            Event::Warning(e) => write!(f, "WARNING {:?}: {}", e.code, e.message),
            Event::Session(e) => match e.status {
                Some(status) => write!(f, "SESSION({}) {:?}", e.device, status),
                None => write!(f, "SESSION({}) disconnected", e.device),
            },
            Event::Transport(e) => write!(f, "TRANSPORT {:?}", e),
        }
    }
}
