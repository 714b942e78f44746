//! Audio capture port interfaces

use std::time::Duration;

use thiserror::Error;

use crate::domain::recording::CaptureFormat;

/// Capture errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("No audio input device available")]
    NoDevice,

    #[error("Audio input device '{0}' not found")]
    DeviceNotFound(String),

    #[error("Capture device unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to open capture stream: {0}")]
    OpenFailed(String),

    #[error("Capture stream failed: {0}")]
    StreamFailed(String),
}

/// Port for opening raw PCM input streams from a capture device.
///
/// Each call opens an independent stream; the platform arbitrates access to
/// the physical device. Implementations must be shareable across threads
/// because streams are opened on the worker thread that reads them.
pub trait AudioSource: Send + Sync {
    /// Open a mono/16-bit input stream in (or converted to) `format`.
    fn open(&self, format: CaptureFormat) -> Result<Box<dyn PcmStream>, CaptureError>;

    /// Human-readable name for logging
    fn name(&self) -> String;
}

/// A live capture stream. Dropping it stops capture and releases the device.
pub trait PcmStream {
    /// Sample rate the samples returned by `read` are at.
    ///
    /// May differ from the requested rate when the device cannot run at it.
    fn sample_rate(&self) -> u32;

    /// Read up to `buf.len()` samples, waiting at most `timeout` for data.
    ///
    /// Returns `Ok(0)` when nothing arrived within the timeout.
    fn read(&mut self, buf: &mut [i16], timeout: Duration) -> Result<usize, CaptureError>;
}
