//! Normalized loudness of one batch of captured samples

use std::fmt;

/// Largest representable magnitude of a signed 16-bit sample
pub const FULL_SCALE: f64 = i16::MAX as f64;

/// Floor reported by [`Amplitude::dbfs`] for silence
const MIN_DBFS: f32 = -96.0;

/// Normalized loudness in `[0.0, 1.0]`.
///
/// Produced once per emission cycle from the root-mean-square of a batch of
/// samples divided by [`FULL_SCALE`]. Values are clamped, so clipped input
/// (e.g. a run of `i16::MIN`) reports exactly `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Amplitude(f32);

impl Amplitude {
    /// Silence
    pub const SILENCE: Self = Self(0.0);

    /// Full scale
    pub const FULL: Self = Self(1.0);

    /// Create an amplitude, clamping into `[0, 1]`. NaN maps to silence.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::SILENCE;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Reduce a batch of samples to its normalized RMS level.
    ///
    /// Returns `None` for an empty batch so callers skip the cycle instead of
    /// reporting a spurious flat reading.
    pub fn from_rms(samples: &[i16]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let sum_squares: f64 = samples
            .iter()
            .map(|&s| {
                let s = s as f64;
                s * s
            })
            .sum();
        let rms = (sum_squares / samples.len() as f64).sqrt();
        Some(Self::new((rms / FULL_SCALE) as f32))
    }

    /// Get the raw value
    pub const fn value(&self) -> f32 {
        self.0
    }

    /// Level in decibels relative to full scale, floored at -96 dBFS
    pub fn dbfs(&self) -> f32 {
        if self.0 <= 0.0 {
            return MIN_DBFS;
        }
        (20.0 * self.0.log10()).max(MIN_DBFS)
    }
}

impl From<Amplitude> for f32 {
    fn from(a: Amplitude) -> Self {
        a.0
    }
}

impl fmt::Display for Amplitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}
