//! Devices command handler

use colored::Colorize;

use crate::application::ports::CaptureError;
use crate::infrastructure::{list_devices, DeviceInfo};

use super::presenter::Presenter;

/// Print every input device on the default host
pub fn handle_devices_command(presenter: &Presenter) -> Result<(), CaptureError> {
    let devices = list_devices()?;
    if devices.is_empty() {
        presenter.warn("No input devices found");
        return Ok(());
    }

    for device in &devices {
        presenter.output(&format_device(device));
    }
    presenter.info("Select one with --device <INDEX|NAME> or `config set device`");
    Ok(())
}

fn format_device(device: &DeviceInfo) -> String {
    let marker = if device.is_default {
        "*".green().to_string()
    } else {
        " ".to_string()
    };
    let details = match device.default_config {
        Some((rate, channels)) => format!("{} Hz, {} ch", rate, channels),
        None => "no default config".to_string(),
    };
    format!(
        "{} [{}] {} ({})",
        marker,
        device.index,
        device.name,
        details.dimmed()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_default_device() {
        colored::control::set_override(false);
        let line = format_device(&DeviceInfo {
            index: 0,
            name: "Built-in Mic".to_string(),
            is_default: true,
            default_config: Some((48_000, 2)),
        });
        assert_eq!(line, "* [0] Built-in Mic (48000 Hz, 2 ch)");
    }

    #[test]
    fn format_device_without_config() {
        colored::control::set_override(false);
        let line = format_device(&DeviceInfo {
            index: 3,
            name: "USB".to_string(),
            is_default: false,
            default_config: None,
        });
        assert_eq!(line, "  [3] USB (no default config)");
    }
}
