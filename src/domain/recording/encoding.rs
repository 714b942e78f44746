//! Fixed encoding parameters for recorded files and capture streams

/// Target sample rate for recordings and the visualizer stream
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Target bitrate for lossy containers, in bits per second
pub const TARGET_BITRATE: u32 = 96_000;

/// Recordings are mono
pub const TARGET_CHANNELS: u16 = 1;

/// Parameters every recording session is encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingParams {
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate: u32,
}

impl EncodingParams {
    /// Mono, 44.1kHz, 96kbps
    pub const fn standard() -> Self {
        Self {
            sample_rate: TARGET_SAMPLE_RATE,
            channels: TARGET_CHANNELS,
            bitrate: TARGET_BITRATE,
        }
    }

    /// Override the sample rate
    pub const fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Override the bitrate from a kbps setting
    pub const fn with_bitrate_kbps(mut self, kbps: u32) -> Self {
        self.bitrate = kbps * 1000;
        self
    }

    /// Capture format matching these parameters
    pub const fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

impl Default for EncodingParams {
    fn default() -> Self {
        Self::standard()
    }
}

/// Raw PCM format requested from a capture device (signed 16-bit samples).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl CaptureFormat {
    /// Mono 16-bit at 44.1kHz
    pub const fn mono() -> Self {
        Self {
            sample_rate: TARGET_SAMPLE_RATE,
            channels: TARGET_CHANNELS,
        }
    }

    /// Smallest buffer (in samples) worth reading in one go: 40ms of audio
    pub const fn min_buffer_len(&self) -> usize {
        let samples = (self.sample_rate as usize / 25) * self.channels as usize;
        if samples == 0 {
            1
        } else {
            samples
        }
    }
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self::mono()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_params() {
        let params = EncodingParams::standard();
        assert_eq!(params.sample_rate, 44_100);
        assert_eq!(params.channels, 1);
        assert_eq!(params.bitrate, 96_000);
    }

    #[test]
    fn bitrate_override() {
        let params = EncodingParams::standard().with_bitrate_kbps(128);
        assert_eq!(params.bitrate, 128_000);
    }

    #[test]
    fn min_buffer_is_40ms() {
        assert_eq!(CaptureFormat::mono().min_buffer_len(), 1764);
    }

    #[test]
    fn min_buffer_never_zero() {
        let format = CaptureFormat {
            sample_rate: 10,
            channels: 1,
        };
        assert_eq!(format.min_buffer_len(), 1);
    }
}
