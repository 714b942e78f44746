//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, SourceKind};
use crate::domain::error::ConfigError;
use crate::domain::recording::Duration;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;
    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));
    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let config = store.load().await?;
    match read_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output("(not set)"),
    }
    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;
    for key in VALID_CONFIG_KEYS {
        let value = read_value(&config, key).unwrap_or_else(|| "(not set)".to_string());
        presenter.key_value(key, &value);
    }
    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

/// Validate `value` for `key` and store it in `config`
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    validate_config_value(key, value)?;
    match key {
        "device" => config.device = Some(value.to_string()),
        "source" => config.source = value.parse::<SourceKind>().ok().map(|k| k.to_string()),
        "sample_rate" => config.sample_rate = Some(parse_positive(key, value)?),
        "bitrate_kbps" => config.bitrate_kbps = Some(parse_positive(key, value)?),
        "emission_interval" => config.emission_interval = Some(value.to_string()),
        "read_timeout" => config.read_timeout = Some(value.to_string()),
        "ffmpeg_path" => config.ffmpeg_path = Some(value.to_string()),
        _ => unreachable!(), // Already validated
    }
    Ok(())
}

fn read_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "device" => config.device.clone(),
        "source" => config.source.clone(),
        "sample_rate" => config.sample_rate.map(|v| v.to_string()),
        "bitrate_kbps" => config.bitrate_kbps.map(|v| v.to_string()),
        "emission_interval" => config.emission_interval.clone(),
        "read_timeout" => config.read_timeout.clone(),
        "ffmpeg_path" => config.ffmpeg_path.clone(),
        _ => None,
    }
}

/// Validate a config value based on key type
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::ValidationError {
        key: key.to_string(),
        message,
    };
    match key {
        "source" => {
            value
                .parse::<SourceKind>()
                .map_err(|e| invalid(e.to_string()))?;
        }
        "sample_rate" | "bitrate_kbps" => {
            parse_positive(key, value)?;
        }
        "emission_interval" | "read_timeout" => {
            value
                .parse::<Duration>()
                .map_err(|e| invalid(e.to_string()))?;
        }
        "device" | "ffmpeg_path" => {
            if value.trim().is_empty() {
                return Err(invalid("Value must not be empty".to_string()));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Parse a strictly positive integer
fn parse_positive(key: &str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: "Value must be a positive integer".to_string(),
        }),
    }
}
