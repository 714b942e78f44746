//! Domain layer - Core business logic
//!
//! Contains value objects, the recording lifecycle state machine,
//! amplitude reduction and domain errors.
//! This layer has no dependencies on external systems.

pub mod amplitude;
pub mod config;
pub mod error;
pub mod recording;

// Re-export common types
pub use amplitude::Amplitude;
pub use config::AppConfig;
pub use error::*;
pub use recording::{
    ContainerFormat, Destination, Duration, EncodingParams, RecordingLifecycle, SessionState,
};
