//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with external systems like cpal, ffmpeg and the filesystem.

pub mod capture;
pub mod config;
pub mod encoding;
pub mod recording;

// Re-export adapters
pub use capture::{create_source, list_devices, CpalSource, DeviceInfo, ToneSource};
pub use config::XdgConfigStore;
pub use encoding::FormatEncoder;
pub use recording::{create_recorder, DefaultRecorder, PipelineRecorder};
