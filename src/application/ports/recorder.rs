//! Recorder port interfaces

use std::time::Duration;

use thiserror::Error;

use super::capture::CaptureError;
use super::encoder::EncoderError;
use crate::domain::recording::{Destination, EncodingParams};

/// Recorder errors
#[derive(Debug, Clone, Error)]
pub enum RecorderError {
    #[error("Failed to start recording: {0}")]
    Capture(#[from] CaptureError),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Recording worker failed: {0}")]
    Worker(String),
}

/// Summary of a finalized recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedRecording {
    /// Size of the produced file in bytes
    pub bytes: u64,
    /// Audio captured into the file (pauses excluded)
    pub captured: Duration,
}

/// Port for the platform recorder: something that turns a destination into a
/// live recording writing captured audio to it.
pub trait Recorder: Send + Sync {
    /// Acquire the device and encoder and start writing to `destination`.
    fn begin(
        &self,
        destination: &Destination,
        params: &EncodingParams,
    ) -> Result<Box<dyn ActiveRecording>, RecorderError>;

    /// Whether recordings from this recorder can pause mid-stream
    fn supports_pause(&self) -> bool;
}

/// Exclusive handle to one live recording.
///
/// Dropping the handle without finalizing still stops capture and releases
/// the device.
pub trait ActiveRecording: Send {
    /// Stop writing captured audio until resumed
    fn pause(&mut self) -> Result<(), RecorderError>;

    /// Continue writing captured audio
    fn resume(&mut self) -> Result<(), RecorderError>;

    /// Stop capture, flush and close the file
    fn finalize(self: Box<Self>) -> Result<FinalizedRecording, RecorderError>;
}
