//! Streaming sample-rate conversion with rubato

use rubato::{FftFixedIn, Resampler};

use crate::application::ports::EncoderError;

/// Frames per resampler chunk
const CHUNK_SIZE: usize = 1024;

/// Converts a mono i16 stream from the device rate to the target rate,
/// one capture batch at a time.
///
/// Input that does not fill a whole chunk is held back until the next batch
/// or [`StreamResampler::flush`]. The converter's own delay is dropped from
/// the head of the output so the stream stays aligned with its input.
pub struct StreamResampler {
    resampler: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
    /// Leading output frames still to discard
    delay: usize,
    ratio: f64,
    consumed: u64,
    produced: u64,
}

impl StreamResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self, EncoderError> {
        let resampler = if source_rate == target_rate {
            None
        } else {
            Some(
                FftFixedIn::<f32>::new(
                    source_rate as usize,
                    target_rate as usize,
                    CHUNK_SIZE,
                    2, // Sub-chunks
                    1, // Mono
                )
                .map_err(|e| EncoderError::CreateFailed(format!("Resampler init failed: {}", e)))?,
            )
        };
        let delay = resampler.as_ref().map_or(0, |r| r.output_delay());
        Ok(Self {
            resampler,
            pending: Vec::new(),
            delay,
            ratio: target_rate as f64 / source_rate.max(1) as f64,
            consumed: 0,
            produced: 0,
        })
    }

    /// Whether samples pass through untouched
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    /// Feed one batch, returning whatever output is ready
    pub fn process(&mut self, input: &[i16]) -> Result<Vec<i16>, EncoderError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(input.to_vec());
        };

        self.pending
            .extend(input.iter().map(|&s| s as f32 / 32768.0));
        self.consumed += input.len() as u64;

        let mut output = Vec::new();
        loop {
            let frames_needed = resampler.input_frames_next();
            if self.pending.len() < frames_needed {
                break;
            }
            let chunk: Vec<Vec<f32>> = vec![self.pending.drain(..frames_needed).collect()];
            let resampled = resampler
                .process(&chunk, None)
                .map_err(|e| EncoderError::WriteFailed(format!("Resampling failed: {}", e)))?;
            append_after_delay(&resampled[0], &mut self.delay, &mut output);
        }
        self.produced += output.len() as u64;
        Ok(output)
    }

    /// Drain held-back input, padding the last chunk with silence and
    /// trimming the output to the converted length.
    pub fn flush(&mut self) -> Result<Vec<i16>, EncoderError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(Vec::new());
        };
        let expected = (self.consumed as f64 * self.ratio).round() as u64;
        let mut output = Vec::new();

        while self.produced + (output.len() as u64) < expected {
            let frames_needed = resampler.input_frames_next();
            let mut chunk: Vec<f32> = self
                .pending
                .drain(..frames_needed.min(self.pending.len()))
                .collect();
            chunk.resize(frames_needed, 0.0);
            let chunk = vec![chunk];
            let resampled = resampler
                .process(&chunk, None)
                .map_err(|e| EncoderError::FinalizeFailed(format!("Resampling failed: {}", e)))?;
            if resampled[0].is_empty() {
                break;
            }
            append_after_delay(&resampled[0], &mut self.delay, &mut output);
        }

        output.truncate(expected.saturating_sub(self.produced) as usize);
        self.produced += output.len() as u64;
        Ok(output)
    }
}

fn append_after_delay(resampled: &[f32], delay: &mut usize, output: &mut Vec<i16>) {
    let skip = (*delay).min(resampled.len());
    *delay -= skip;
    output.extend(resampled[skip..].iter().map(|&s| to_i16(s)));
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_passes_through() {
        let mut resampler = StreamResampler::new(44_100, 44_100).unwrap();
        assert!(resampler.is_passthrough());
        assert_eq!(resampler.process(&[1, 2, 3]).unwrap(), vec![1, 2, 3]);
        assert!(resampler.flush().unwrap().is_empty());
    }

    #[test]
    fn converts_length_by_ratio() {
        let mut resampler = StreamResampler::new(48_000, 44_100).unwrap();
        let mut total = 0;
        for _ in 0..10 {
            total += resampler.process(&[0i16; 4800]).unwrap().len();
        }
        total += resampler.flush().unwrap().len();
        assert_eq!(total, 44_100);
    }

    #[test]
    fn short_input_is_held_until_flush() {
        let mut resampler = StreamResampler::new(16_000, 44_100).unwrap();
        assert!(resampler.process(&[0i16; 100]).unwrap().is_empty());
        let flushed = resampler.flush().unwrap();
        assert_eq!(flushed.len(), (100.0f64 * 44_100.0 / 16_000.0).round() as usize);
    }

    #[test]
    fn output_stays_aligned_with_input() {
        // Silence, then a half-scale step held to the end
        let mut input = vec![0i16; 4800];
        input.extend(std::iter::repeat(16_384i16).take(4800));

        let mut resampler = StreamResampler::new(48_000, 44_100).unwrap();
        let mut output = Vec::new();
        for batch in input.chunks(960) {
            output.extend(resampler.process(batch).unwrap());
        }
        output.extend(resampler.flush().unwrap());

        assert_eq!(output.len(), 8820);
        let edge = output.iter().position(|&s| s > 8_192).unwrap();
        assert!(edge.abs_diff(4410) <= 20, "step moved to {}", edge);
        // The held level survives up to the end of the stream
        assert!(output[8700..8800].iter().all(|&s| s > 12_000));
    }
}
