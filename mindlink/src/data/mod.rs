mod bus;
mod demux;
mod event;
pub mod metrics;
pub mod motion;

pub use bus::{EventBus, Subscription, SubscriptionId, DEFAULT_SUBSCRIBER_QUEUE};
pub use demux::{DemuxError, Demultiplexer};
pub use event::{
    Category, Event, MentalCommandEvent, MotionEvent, PerformanceMetricsEvent, SessionEvent,
    SystemEvent, TransportEvent, WarningEvent, PUSH_COMMAND,
};
pub use metrics::{MetricsRow, MetricsSchema};
pub use motion::{quaternion_to_euler, EulerAngles, MotionSample};
