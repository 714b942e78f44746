//! Capture infrastructure module
//!
//! Audio sources: cpal microphone input and a synthetic tone generator.

mod cpal_source;
mod ring;
mod tone;

use std::sync::Arc;

pub use cpal_source::{list_devices, CpalSource, DeviceInfo, DEFAULT_DEVICE};
pub use ring::SampleRing;
pub use tone::ToneSource;

use crate::application::ports::AudioSource;
use crate::domain::config::{AppConfig, SourceKind};

/// Create the audio source selected by the configuration
pub fn create_source(config: &AppConfig) -> Arc<dyn AudioSource> {
    match config.source_or_default() {
        SourceKind::Microphone => Arc::new(CpalSource::with_device(config.device_or_default())),
        SourceKind::Tone => Arc::new(ToneSource::new()),
    }
}
