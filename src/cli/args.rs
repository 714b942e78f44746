//! CLI argument definitions using Clap

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::application::Command;
use crate::domain::config::AppConfig;

/// micpulse - microphone recording with a live level meter
#[derive(Parser, Debug)]
#[command(name = "micpulse")]
#[command(version)]
#[command(about = "Record the microphone to a file while watching its level")]
#[command(long_about = None)]
pub struct Cli {
    /// Input device name or index (see `micpulse devices`)
    #[arg(long, value_name = "DEVICE", env = "MICPULSE_DEVICE", global = true)]
    pub device: Option<String>,

    /// Audio source
    #[arg(long, value_name = "SOURCE", global = true)]
    pub source: Option<SourceArg>,

    /// ffmpeg binary used for AAC, MP3 and Opus output
    #[arg(long, value_name = "PATH", env = "MICPULSE_FFMPEG", global = true)]
    pub ffmpeg: Option<String>,

    /// Log lifecycle events to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Config overrides given on the command line (or their env fallbacks)
    pub fn config_overrides(&self) -> AppConfig {
        let (sample_rate, bitrate_kbps) = match &self.command {
            Commands::Record(args) => (args.sample_rate, args.bitrate),
            _ => (None, None),
        };
        AppConfig {
            device: self.device.clone(),
            source: self.source.map(|s| s.as_str().to_string()),
            sample_rate,
            bitrate_kbps,
            ffmpeg_path: self.ffmpeg.clone(),
            ..Default::default()
        }
    }
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record to a file until Ctrl+C or the duration elapses
    Record(RecordArgs),
    /// Show the live input level without recording
    Meter {
        /// Stop after this long (e.g., 10s, 1m)
        #[arg(short = 'd', long, value_name = "TIME")]
        duration: Option<String>,
    },
    /// Serve the command surface on a local socket
    #[cfg(unix)]
    Daemon,
    /// Send one command to the running daemon
    #[cfg(unix)]
    Send {
        /// Command to send
        method: MethodArg,
        /// Destination path for startRecording
        path: Option<String>,
    },
    /// Stream amplitude events from the running daemon
    #[cfg(unix)]
    Watch,
    /// List audio input devices
    Devices,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `record`
#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Output file; the extension picks the container (.m4a, .aac, .mp3, .ogg, .flac, .wav)
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Stop after this long (e.g., 10s, 1m, 2m30s)
    #[arg(short = 'd', long, value_name = "TIME")]
    pub duration: Option<String>,

    /// Do not open a second stream for the level meter
    #[arg(long)]
    pub no_meter: bool,

    /// Sample rate of the file in Hz
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Bitrate for lossy containers in kbps
    #[arg(short = 'b', long, value_name = "KBPS")]
    pub bitrate: Option<u32>,
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Source argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Microphone,
    Tone,
}

impl SourceArg {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Microphone => "microphone",
            Self::Tone => "tone",
        }
    }
}

/// Daemon command names as accepted on the command line
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    #[value(name = "startRecording", alias = "start")]
    StartRecording,
    #[value(name = "stopRecording", alias = "stop")]
    StopRecording,
    #[value(name = "pauseRecording", alias = "pause")]
    PauseRecording,
    #[value(name = "resumeRecording", alias = "resume")]
    ResumeRecording,
    #[value(name = "startVisualizer")]
    StartVisualizer,
    #[value(name = "stopVisualizer")]
    StopVisualizer,
    #[value(name = "status")]
    Status,
}

impl MethodArg {
    /// Build the wire command
    pub fn into_command(self, path: Option<String>) -> Command {
        match self {
            Self::StartRecording => Command::StartRecording { file_path: path },
            Self::StopRecording => Command::StopRecording,
            Self::PauseRecording => Command::PauseRecording,
            Self::ResumeRecording => Command::ResumeRecording,
            Self::StartVisualizer => Command::StartVisualizer,
            Self::StopVisualizer => Command::StopVisualizer,
            Self::Status => Command::Status,
        }
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "device",
    "source",
    "sample_rate",
    "bitrate_kbps",
    "emission_interval",
    "read_timeout",
    "ffmpeg_path",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_record() {
        let cli = Cli::parse_from(["micpulse", "record", "/tmp/a.m4a"]);
        match cli.command {
            Commands::Record(args) => {
                assert_eq!(args.path, "/tmp/a.m4a");
                assert!(args.duration.is_none());
                assert!(!args.no_meter);
            }
            other => panic!("Expected record, got {:?}", other),
        }
    }

    #[test]
    fn cli_parses_record_options() {
        let cli = Cli::parse_from([
            "micpulse", "record", "out.flac", "-d", "30s", "--no-meter", "-b", "128",
        ]);
        if let Commands::Record(args) = cli.command {
            assert_eq!(args.duration, Some("30s".to_string()));
            assert!(args.no_meter);
            assert_eq!(args.bitrate, Some(128));
        } else {
            panic!("Expected record");
        }
    }

    #[test]
    fn record_requires_path() {
        assert!(Cli::try_parse_from(["micpulse", "record"]).is_err());
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["micpulse", "meter", "--source", "tone", "-v"]);
        assert_eq!(cli.source, Some(SourceArg::Tone));
        assert!(cli.verbose);
    }

    #[test]
    fn overrides_carry_record_settings() {
        let cli = Cli::parse_from([
            "micpulse", "--device", "2", "record", "a.wav", "--sample-rate", "48000",
        ]);
        let config = cli.config_overrides();
        assert_eq!(config.device, Some("2".to_string()));
        assert_eq!(config.sample_rate, Some(48_000));
        assert_eq!(config.bitrate_kbps, None);
    }

    #[cfg(unix)]
    #[test]
    fn cli_parses_send() {
        let cli = Cli::parse_from(["micpulse", "send", "startRecording", "/tmp/a.m4a"]);
        if let Commands::Send { method, path } = cli.command {
            assert_eq!(
                method.into_command(path),
                Command::StartRecording {
                    file_path: Some("/tmp/a.m4a".to_string())
                }
            );
        } else {
            panic!("Expected send");
        }
    }

    #[cfg(unix)]
    #[test]
    fn send_accepts_short_aliases() {
        let cli = Cli::parse_from(["micpulse", "send", "pause"]);
        assert!(matches!(
            cli.command,
            Commands::Send {
                method: MethodArg::PauseRecording,
                ..
            }
        ));
    }

    #[test]
    fn cli_parses_config_set() {
        let cli = Cli::parse_from(["micpulse", "config", "set", "bitrate_kbps", "64"]);
        if let Commands::Config {
            action: ConfigAction::Set { key, value },
        } = cli.command
        {
            assert_eq!(key, "bitrate_kbps");
            assert_eq!(value, "64");
        } else {
            panic!("Expected Config Set command");
        }
    }

    #[test]
    fn valid_config_keys() {
        assert!(is_valid_config_key("device"));
        assert!(is_valid_config_key("emission_interval"));
        assert!(!is_valid_config_key("api_key"));
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
