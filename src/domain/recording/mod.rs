//! Recording value objects and the session lifecycle

mod destination;
mod duration;
mod encoding;
mod session;

pub use destination::{ContainerFormat, Destination};
pub use duration::Duration;
pub use encoding::{CaptureFormat, EncodingParams, TARGET_BITRATE, TARGET_SAMPLE_RATE};
pub use session::{InvalidStateTransition, RecordingLifecycle, SessionState};
