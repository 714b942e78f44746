//! Recording infrastructure module
//!
//! Pipes an audio source through rate conversion into a container encoder.

mod pipeline;
mod resample;

pub use pipeline::PipelineRecorder;
pub use resample::StreamResampler;

use std::sync::Arc;

use crate::application::ports::AudioSource;
use crate::domain::config::AppConfig;
use crate::infrastructure::encoding::FormatEncoder;

/// Recorder over a shared source, encoding by destination extension
pub type DefaultRecorder = PipelineRecorder<dyn AudioSource, FormatEncoder>;

/// Create the recorder described by the configuration
pub fn create_recorder(source: Arc<dyn AudioSource>, config: &AppConfig) -> DefaultRecorder {
    let encoder = Arc::new(FormatEncoder::new(config.ffmpeg_path_or_default()));
    PipelineRecorder::new(source, encoder).with_read_timeout(config.read_timeout_or_default())
}
