//! Microphone capture using cpal
//!
//! Each `open` builds an independent input stream. Callback data is
//! converted to mono i16 and queued in a one second drop-oldest ring that
//! the reader drains with a timeout.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tracing::{debug, error, info, warn};

use super::ring::SampleRing;
use crate::application::ports::{AudioSource, CaptureError, PcmStream};
use crate::domain::recording::CaptureFormat;

/// Name that selects the system default input device
pub const DEFAULT_DEVICE: &str = "default";

/// Input device as listed by [`list_devices`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    /// Default sample rate and channel count, when the device reports one
    pub default_config: Option<(u32, u16)>,
}

/// Enumerate input devices on the default host
pub fn list_devices() -> Result<Vec<DeviceInfo>, CaptureError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Unavailable(format!("Failed to enumerate devices: {}", e)))?;

    Ok(devices
        .filter_map(|d| d.name().ok().map(|name| (d, name)))
        .enumerate()
        .map(|(index, (device, name))| DeviceInfo {
            index,
            is_default: default_name.as_deref() == Some(name.as_str()),
            default_config: device
                .default_input_config()
                .ok()
                .map(|c| (c.sample_rate().0, c.channels())),
            name,
        })
        .collect())
}

/// Audio source backed by a cpal input device
#[derive(Debug, Clone)]
pub struct CpalSource {
    /// Device name, numeric index or `"default"`
    device: String,
}

impl CpalSource {
    /// Source for the system default input device
    pub fn new() -> Self {
        Self::with_device(DEFAULT_DEVICE)
    }

    /// Source for a device given by name or index
    pub fn with_device(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    fn input_device(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        if self.device == DEFAULT_DEVICE || self.device.is_empty() {
            return host.default_input_device().ok_or(CaptureError::NoDevice);
        }

        let devices: Vec<cpal::Device> = host
            .input_devices()
            .map_err(|e| CaptureError::Unavailable(format!("Failed to enumerate devices: {}", e)))?
            .collect();

        if let Ok(index) = self.device.parse::<usize>() {
            return devices
                .into_iter()
                .nth(index)
                .ok_or_else(|| CaptureError::DeviceNotFound(self.device.clone()));
        }

        devices
            .into_iter()
            .find(|d| d.name().map(|n| n == self.device).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(self.device.clone()))
    }

    /// Pick an i16/f32 config, preferring fewer channels and one that runs at
    /// the requested rate.
    fn input_config(
        device: &cpal::Device,
        target_rate: u32,
    ) -> Result<(StreamConfig, SampleFormat), CaptureError> {
        let supported_configs = device
            .supported_input_configs()
            .map_err(|e| CaptureError::OpenFailed(format!("Failed to get configs: {}", e)))?;

        let includes = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate().0 <= target_rate && c.max_sample_rate().0 >= target_rate
        };

        let mut best_config: Option<cpal::SupportedStreamConfigRange> = None;
        for config in supported_configs {
            if config.sample_format() != SampleFormat::I16
                && config.sample_format() != SampleFormat::F32
            {
                continue;
            }
            let is_better = match &best_config {
                None => true,
                Some(current) => {
                    let better_rate = includes(&config) && !includes(current);
                    let same_rate_fit = includes(&config) == includes(current);
                    better_rate || (same_rate_fit && config.channels() < current.channels())
                }
            };
            if is_better {
                best_config = Some(config);
            }
        }

        let config_range = best_config
            .ok_or_else(|| CaptureError::OpenFailed("No suitable input config found".into()))?;

        // Closest supported rate when the target is out of range
        let sample_rate = if includes(&config_range) {
            SampleRate(target_rate)
        } else if config_range.min_sample_rate().0 > target_rate {
            config_range.min_sample_rate()
        } else {
            config_range.max_sample_rate()
        };

        let sample_format = config_range.sample_format();
        let config = StreamConfig {
            channels: config_range.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        Ok((config, sample_format))
    }
}

impl Default for CpalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for CpalSource {
    fn open(&self, format: CaptureFormat) -> Result<Box<dyn PcmStream>, CaptureError> {
        let device = self.input_device()?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown device".to_string());
        let (config, sample_format) = Self::input_config(&device, format.sample_rate)?;
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;

        debug!(
            device = %device_name,
            sample_rate,
            channels,
            ?sample_format,
            "Opening input stream"
        );

        let ring = SampleRing::new(sample_rate as usize);
        let on_error = {
            let ring = ring.clone();
            move |err: cpal::StreamError| {
                error!("Audio stream error: {}", err);
                ring.fail(err.to_string());
            }
        };

        let stream = match sample_format {
            SampleFormat::I16 => {
                let ring = ring.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        ring.push(&downmix(data, channels));
                    },
                    on_error,
                    None,
                )
            }
            SampleFormat::F32 => {
                let ring = ring.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let samples: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                        ring.push(&downmix(&samples, channels));
                    },
                    on_error,
                    None,
                )
            }
            other => {
                return Err(CaptureError::OpenFailed(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        }
        .map_err(|e| CaptureError::OpenFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::OpenFailed(e.to_string()))?;

        info!(device = %device_name, sample_rate, "Capture stream started");
        Ok(Box::new(CpalStream {
            _stream: stream,
            ring,
            sample_rate,
        }))
    }

    fn name(&self) -> String {
        format!("cpal:{}", self.device)
    }
}

/// Live cpal stream; dropping it stops the device callback
struct CpalStream {
    _stream: cpal::Stream,
    ring: SampleRing,
    sample_rate: u32,
}

impl PcmStream for CpalStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [i16], timeout: Duration) -> Result<usize, CaptureError> {
        self.ring.read(buf, timeout)
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        let dropped = self.ring.dropped();
        if dropped > 0 {
            warn!(
                dropped,
                unread = self.ring.len(),
                "Reader fell behind, oldest samples were discarded"
            );
        } else {
            debug!(unread = self.ring.len(), "Capture stream closed");
        }
    }
}

/// Average interleaved channels into mono
pub(crate) fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
