//! WAV encoder sink (16-bit PCM, streamed to disk)

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::application::ports::{EncoderError, EncoderSink};

/// Open WAV destination
pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
    path: PathBuf,
}

impl WavSink {
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self, EncoderError> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)
            .map_err(|e| EncoderError::CreateFailed(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }
}

impl EncoderSink for WavSink {
    fn write(&mut self, samples: &[i16]) -> Result<(), EncoderError> {
        for &sample in samples {
            self.writer
                .write_sample(sample)
                .map_err(|e| EncoderError::WriteFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<u64, EncoderError> {
        let Self { writer, path } = *self;
        writer
            .finalize()
            .map_err(|e| EncoderError::FinalizeFailed(e.to_string()))?;
        std::fs::metadata(&path)
            .map(|m| m.len())
            .map_err(|e| EncoderError::FinalizeFailed(e.to_string()))
    }
}
