//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod amplitude;
pub mod capture;
pub mod config;
pub mod encoder;
pub mod recorder;

// Re-export common types
pub use amplitude::{amplitude_channel, AmplitudeReceiver, AmplitudeSender, AmplitudeSink};
pub use capture::{AudioSource, CaptureError, PcmStream};
pub use config::ConfigStore;
pub use encoder::{AudioEncoder, EncoderError, EncoderSink};
pub use recorder::{ActiveRecording, FinalizedRecording, Recorder, RecorderError};
