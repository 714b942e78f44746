//! Encoding infrastructure module
//!
//! FLAC and WAV are written natively; lossy containers go through ffmpeg.

mod ffmpeg;
mod flac;
mod wav;

pub use ffmpeg::{build_ffmpeg_args, FfmpegSink};
pub use flac::{encode_to_flac, FlacSink};
pub use wav::WavSink;

use tracing::debug;

use crate::application::ports::{AudioEncoder, EncoderError, EncoderSink};
use crate::domain::recording::{ContainerFormat, Destination, EncodingParams};

/// Encoder choosing a writer from the destination's container format
#[derive(Debug, Clone)]
pub struct FormatEncoder {
    ffmpeg_path: String,
}

impl FormatEncoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// ffmpeg binary used for lossy containers
    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }
}

impl Default for FormatEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl AudioEncoder for FormatEncoder {
    fn open(
        &self,
        destination: &Destination,
        params: &EncodingParams,
    ) -> Result<Box<dyn EncoderSink>, EncoderError> {
        let path = destination.path();
        debug!(path = %destination, format = %destination.format(), "Opening encoder");
        Ok(match destination.format() {
            ContainerFormat::Flac => Box::new(FlacSink::create(path, params.sample_rate)?),
            ContainerFormat::Wav => {
                Box::new(WavSink::create(path, params.sample_rate, params.channels)?)
            }
            lossy => Box::new(FfmpegSink::spawn(&self.ffmpeg_path, path, lossy, params)?),
        })
    }
}
