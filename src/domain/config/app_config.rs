//! Application configuration value object

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::recording::{Duration, EncodingParams, TARGET_BITRATE, TARGET_SAMPLE_RATE};

/// Where captured audio comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// A cpal input device
    #[default]
    Microphone,
    /// A synthetic sine tone (no hardware needed)
    Tone,
}

impl SourceKind {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Microphone => "microphone",
            Self::Tone => "tone",
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "microphone" | "mic" => Ok(Self::Microphone),
            "tone" => Ok(Self::Tone),
            other => Err(format!(
                "Invalid source: \"{}\". Valid sources are: microphone, tone",
                other
            )),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub device: Option<String>,
    pub source: Option<String>,
    pub sample_rate: Option<u32>,
    pub bitrate_kbps: Option<u32>,
    pub emission_interval: Option<String>,
    pub read_timeout: Option<String>,
    pub ffmpeg_path: Option<String>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            device: Some("default".to_string()),
            source: Some("microphone".to_string()),
            sample_rate: Some(TARGET_SAMPLE_RATE),
            bitrate_kbps: Some(TARGET_BITRATE / 1000),
            emission_interval: Some(Duration::default_emission_interval().to_string()),
            read_timeout: Some(Duration::default_read_timeout().to_string()),
            ffmpeg_path: Some("ffmpeg".to_string()),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            device: other.device.or(self.device),
            source: other.source.or(self.source),
            sample_rate: other.sample_rate.or(self.sample_rate),
            bitrate_kbps: other.bitrate_kbps.or(self.bitrate_kbps),
            emission_interval: other.emission_interval.or(self.emission_interval),
            read_timeout: other.read_timeout.or(self.read_timeout),
            ffmpeg_path: other.ffmpeg_path.or(self.ffmpeg_path),
        }
    }

    /// Get device name, or "default" if not set
    pub fn device_or_default(&self) -> &str {
        self.device.as_deref().unwrap_or("default")
    }

    /// Get source kind, or microphone if not set/invalid
    pub fn source_or_default(&self) -> SourceKind {
        self.source
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Encoding parameters with configured overrides applied
    pub fn encoding_params(&self) -> EncodingParams {
        let mut params = EncodingParams::standard();
        if let Some(rate) = self.sample_rate.filter(|r| *r > 0) {
            params = params.with_sample_rate(rate);
        }
        if let Some(kbps) = self.bitrate_kbps.filter(|k| *k > 0) {
            params = params.with_bitrate_kbps(kbps);
        }
        params
    }

    /// Get emission interval as parsed Duration, or default if not set/invalid
    pub fn emission_interval_or_default(&self) -> Duration {
        self.emission_interval
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_emission_interval)
    }

    /// Get read timeout as parsed Duration, or default if not set/invalid
    pub fn read_timeout_or_default(&self) -> Duration {
        self.read_timeout
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_read_timeout)
    }

    /// Get ffmpeg binary, or "ffmpeg" if not set
    pub fn ffmpeg_path_or_default(&self) -> &str {
        self.ffmpeg_path.as_deref().unwrap_or("ffmpeg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_expected_values() {
        let config = AppConfig::defaults();
        assert_eq!(config.device, Some("default".to_string()));
        assert_eq!(config.source, Some("microphone".to_string()));
        assert_eq!(config.sample_rate, Some(44_100));
        assert_eq!(config.bitrate_kbps, Some(96));
        assert_eq!(config.emission_interval, Some("50ms".to_string()));
        assert_eq!(config.read_timeout, Some("50ms".to_string()));
        assert_eq!(config.ffmpeg_path, Some("ffmpeg".to_string()));
    }

    #[test]
    fn empty_has_all_none() {
        let config = AppConfig::empty();
        assert!(config.device.is_none());
        assert!(config.source.is_none());
        assert!(config.sample_rate.is_none());
        assert!(config.emission_interval.is_none());
    }

    #[test]
    fn merge_other_takes_precedence() {
        let base = AppConfig {
            device: Some("default".to_string()),
            bitrate_kbps: Some(96),
            ..Default::default()
        };
        let other = AppConfig {
            device: Some("USB Mic".to_string()),
            bitrate_kbps: None,
            ..Default::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.device, Some("USB Mic".to_string()));
        assert_eq!(merged.bitrate_kbps, Some(96));
    }

    #[test]
    fn encoding_params_apply_overrides() {
        let config = AppConfig {
            sample_rate: Some(48_000),
            bitrate_kbps: Some(128),
            ..Default::default()
        };
        let params = config.encoding_params();
        assert_eq!(params.sample_rate, 48_000);
        assert_eq!(params.bitrate, 128_000);
        assert_eq!(params.channels, 1);
    }

    #[test]
    fn encoding_params_ignore_zero() {
        let config = AppConfig {
            sample_rate: Some(0),
            bitrate_kbps: Some(0),
            ..Default::default()
        };
        assert_eq!(config.encoding_params(), EncodingParams::standard());
    }

    #[test]
    fn intervals_parse_or_default() {
        let config = AppConfig {
            emission_interval: Some("100ms".to_string()),
            read_timeout: Some("invalid".to_string()),
            ..Default::default()
        };
        assert_eq!(config.emission_interval_or_default().as_millis(), 100);
        assert_eq!(config.read_timeout_or_default().as_millis(), 50);
    }

    #[test]
    fn source_or_default() {
        assert_eq!(AppConfig::empty().source_or_default(), SourceKind::Microphone);
        let config = AppConfig {
            source: Some("tone".to_string()),
            ..Default::default()
        };
        assert_eq!(config.source_or_default(), SourceKind::Tone);
    }

    #[test]
    fn source_kind_parse() {
        assert_eq!("mic".parse::<SourceKind>().unwrap(), SourceKind::Microphone);
        assert!("speaker".parse::<SourceKind>().is_err());
    }
}
