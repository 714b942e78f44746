//! Encoder port interfaces

use thiserror::Error;

use crate::domain::recording::{Destination, EncodingParams};

/// Encoder errors
#[derive(Debug, Clone, Error)]
pub enum EncoderError {
    #[error("Failed to create output file: {0}")]
    CreateFailed(String),

    #[error("FFmpeg not found at '{0}'. Install ffmpeg or record to .flac/.wav")]
    FfmpegNotFound(String),

    #[error("Failed to write audio: {0}")]
    WriteFailed(String),

    #[error("Failed to finalize audio file: {0}")]
    FinalizeFailed(String),
}

/// Port for opening a writer that encodes PCM into a destination file
pub trait AudioEncoder: Send + Sync {
    /// Create the destination file and prepare to encode into it.
    ///
    /// Samples written to the returned sink are mono i16 at
    /// `params.sample_rate`.
    fn open(
        &self,
        destination: &Destination,
        params: &EncodingParams,
    ) -> Result<Box<dyn EncoderSink>, EncoderError>;
}

/// An open encoder writing to one file
pub trait EncoderSink: Send {
    /// Append samples
    fn write(&mut self, samples: &[i16]) -> Result<(), EncoderError>;

    /// Flush and close the file, returning its size in bytes
    fn finish(self: Box<Self>) -> Result<u64, EncoderError>;
}
