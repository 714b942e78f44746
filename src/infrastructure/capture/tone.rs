//! Synthetic capture source
//!
//! Produces a deterministic waveform paced at real time, for machines
//! without an input device and for tests.

use std::f64::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};

use crate::application::ports::{AudioSource, CaptureError, PcmStream};
use crate::domain::recording::CaptureFormat;

/// Shape of the generated signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waveform {
    Sine,
    /// Alternates between +peak and -peak every half period
    Square,
    Silence,
}

/// Audio source generating a tone instead of reading a device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSource {
    waveform: Waveform,
    frequency: f64,
    /// Peak level in `[0, 1]` of full scale
    level: f64,
}

impl ToneSource {
    /// 440Hz sine at half scale
    pub fn new() -> Self {
        Self {
            waveform: Waveform::Sine,
            frequency: 440.0,
            level: 0.5,
        }
    }

    /// All-zero samples
    pub fn silence() -> Self {
        Self {
            waveform: Waveform::Silence,
            ..Self::new()
        }
    }

    /// Full-scale square wave, RMS level 1.0
    pub fn full_scale() -> Self {
        Self {
            waveform: Waveform::Square,
            level: 1.0,
            ..Self::new()
        }
    }

    pub fn with_level(mut self, level: f64) -> Self {
        self.level = level.clamp(0.0, 1.0);
        self
    }
}

impl Default for ToneSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for ToneSource {
    fn open(&self, format: CaptureFormat) -> Result<Box<dyn PcmStream>, CaptureError> {
        if format.sample_rate == 0 {
            return Err(CaptureError::OpenFailed("sample rate must be positive".into()));
        }
        Ok(Box::new(ToneStream {
            tone: *self,
            sample_rate: format.sample_rate,
            started: Instant::now(),
            produced: 0,
        }))
    }

    fn name(&self) -> String {
        format!("tone:{:?}@{}Hz", self.waveform, self.frequency).to_lowercase()
    }
}

struct ToneStream {
    tone: ToneSource,
    sample_rate: u32,
    started: Instant,
    produced: u64,
}

impl ToneStream {
    /// Samples the clock says should exist by now but were not read yet
    fn available(&self) -> u64 {
        let due = self.started.elapsed().as_secs_f64() * self.sample_rate as f64;
        (due as u64).saturating_sub(self.produced)
    }

    fn sample_at(&self, index: u64) -> i16 {
        let peak = self.tone.level * i16::MAX as f64;
        let phase = (index as f64 * self.tone.frequency / self.sample_rate as f64).fract();
        let value = match self.tone.waveform {
            Waveform::Sine => (TAU * phase).sin() * peak,
            Waveform::Square if phase < 0.5 => peak,
            Waveform::Square => -peak,
            Waveform::Silence => 0.0,
        };
        value.round() as i16
    }
}

impl PcmStream for ToneStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [i16], timeout: Duration) -> Result<usize, CaptureError> {
        let deadline = Instant::now() + timeout;
        let mut available = self.available();
        while available == 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(0);
            }
            thread::sleep(remaining.min(Duration::from_millis(1)));
            available = self.available();
        }

        let n = buf.len().min(available as usize);
        for (offset, slot) in buf[..n].iter_mut().enumerate() {
            *slot = self.sample_at(self.produced + offset as u64);
        }
        self.produced += n as u64;
        Ok(n)
    }
}
