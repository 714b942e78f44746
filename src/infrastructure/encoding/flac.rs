//! FLAC encoder sink
//!
//! flacenc encodes from memory, so samples are buffered until `finish`.
//! The output file is created at open so an unwritable destination fails
//! the start of a session rather than its end.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::config;
use flacenc::error::Verify;
use flacenc::source::MemSource;
use tracing::debug;

use crate::application::ports::{EncoderError, EncoderSink};

/// Bits per sample (16-bit audio)
const BITS_PER_SAMPLE: usize = 16;

/// Number of channels (mono)
const CHANNELS: usize = 1;

/// Encode mono i16 samples at `sample_rate` to FLAC bytes
pub fn encode_to_flac(pcm_samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, EncoderError> {
    // An empty capture still gets a decodable file
    let samples_i32: Vec<i32> = if pcm_samples.is_empty() {
        vec![0]
    } else {
        pcm_samples.iter().map(|&s| s as i32).collect()
    };

    let config = config::Encoder::default()
        .into_verified()
        .map_err(|(_, e)| EncoderError::FinalizeFailed(format!("FLAC config error: {:?}", e)))?;

    let source = MemSource::from_samples(
        &samples_i32,
        CHANNELS,
        BITS_PER_SAMPLE,
        sample_rate as usize,
    );

    let flac_stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
        .map_err(|e| EncoderError::FinalizeFailed(format!("FLAC encoding failed: {:?}", e)))?;

    let mut sink = ByteSink::new();
    flac_stream
        .write(&mut sink)
        .map_err(|e| EncoderError::FinalizeFailed(format!("FLAC write failed: {}", e)))?;

    Ok(sink.into_inner())
}

/// Open FLAC destination
pub struct FlacSink {
    file: File,
    sample_rate: u32,
    samples: Vec<i16>,
}

impl FlacSink {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, EncoderError> {
        let file = File::create(path)
            .map_err(|e| EncoderError::CreateFailed(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            file,
            sample_rate,
            samples: Vec::new(),
        })
    }
}

impl EncoderSink for FlacSink {
    fn write(&mut self, samples: &[i16]) -> Result<(), EncoderError> {
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<u64, EncoderError> {
        let bytes = encode_to_flac(&self.samples, self.sample_rate)?;
        self.file
            .write_all(&bytes)
            .and_then(|_| self.file.sync_all())
            .map_err(|e| EncoderError::FinalizeFailed(e.to_string()))?;
        debug!(
            samples = self.samples.len(),
            bytes = bytes.len(),
            "FLAC stream written"
        );
        Ok(bytes.len() as u64)
    }
}
