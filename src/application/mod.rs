//! Application layer - Use cases and port interfaces
//!
//! Contains the recording and visualizer use cases, the command surface
//! over both, and trait definitions for external system interactions.

pub mod commands;
pub mod ports;
pub mod recording;
pub mod visualizer;

// Re-export use cases
pub use commands::{
    AudioController, Command, CommandError, CommandResponse, ErrorKind, Event, Reply,
    StatusReport,
};
pub use recording::{RecordingSession, SessionError, StoppedRecording};
pub use visualizer::{AmplitudeMonitor, MonitorConfig, VisualizerError};
