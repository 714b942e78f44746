//! Runners for the foreground `record` and `meter` commands

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use tokio::task::block_in_place;
use tracing::debug;

use crate::application::ports::{
    amplitude_channel, AmplitudeSink, AudioSource, ConfigStore, Recorder,
};
use crate::application::{
    AmplitudeMonitor, AudioController, Command, CommandError, CommandResponse, ErrorKind,
    MonitorConfig, RecordingSession,
};
use crate::domain::config::AppConfig;
use crate::domain::recording::{Duration, SessionState};
use crate::infrastructure::{create_recorder, create_source, DefaultRecorder, XdgConfigStore};

use super::presenter::Presenter;
use super::signals::{ControlSignal, SignalHandler};

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Levels buffered between the sampling thread and the terminal
const LEVEL_BUFFER: usize = 8;

/// Redraw cadence of the recording line
const REFRESH_INTERVAL: StdDuration = StdDuration::from_millis(100);

/// Controller wired to the configured source
pub type DefaultController = AudioController<DefaultRecorder, dyn AudioSource>;

/// Options of the foreground recorder
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub path: String,
    /// Stop after this much recorded (unpaused) time
    pub duration: Option<Duration>,
    /// Show a live level meter
    pub meter: bool,
}

/// Sampling loop settings from the configuration
pub fn monitor_config(config: &AppConfig) -> MonitorConfig {
    MonitorConfig::default()
        .with_emission_interval(config.emission_interval_or_default())
        .with_read_timeout(config.read_timeout_or_default())
}

/// Build the controller for the configured source.
///
/// Recording and the visualizer share the source but open independent
/// streams from it.
pub fn build_controller(
    config: &AppConfig,
    sink: Arc<dyn AmplitudeSink>,
) -> DefaultController {
    let source = create_source(config);
    let recorder = create_recorder(Arc::clone(&source), config);
    let session = RecordingSession::with_params(recorder, config.encoding_params());
    let monitor = AmplitudeMonitor::new(source, monitor_config(config));
    AudioController::new(session, monitor, sink)
}

/// Pause a live recording or resume a paused one; `None` when idle
pub fn toggle_pause<R, S>(
    controller: &mut AudioController<R, S>,
) -> Option<Result<CommandResponse, CommandError>>
where
    R: Recorder,
    S: AudioSource + ?Sized + 'static,
{
    let command = match controller.session().state() {
        SessionState::Recording => Command::PauseRecording,
        SessionState::Paused => Command::ResumeRecording,
        SessionState::Idle => return None,
    };
    Some(controller.handle(command))
}

/// Record to a file until a signal or the duration ends it
pub async fn run_record(config: AppConfig, options: RecordOptions) -> ExitCode {
    let mut presenter = Presenter::new();

    let mut signals = match SignalHandler::new(false) {
        Ok(s) => s,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let (sink, mut levels) = amplitude_channel(LEVEL_BUFFER);
    let mut controller = build_controller(&config, Arc::new(sink));

    let start = Command::StartRecording {
        file_path: Some(options.path.clone()),
    };
    if let Err(e) = block_in_place(|| controller.handle(start)) {
        presenter.error(&e.message);
        return ExitCode::from(if e.code == ErrorKind::InvalidArgument {
            EXIT_USAGE_ERROR
        } else {
            EXIT_ERROR
        });
    }

    if options.meter {
        if let Err(e) = block_in_place(|| controller.handle(Command::StartVisualizer)) {
            presenter.warn(&format!("Level meter unavailable: {}", e.message));
        }
    }

    presenter.show_recording_progress("Recording");
    #[cfg(unix)]
    debug!(pid = std::process::id(), "Send SIGUSR1 to toggle pause");

    let limit_ms = options.duration.map(|d| d.as_millis());
    let mut refresh = tokio::time::interval(REFRESH_INTERVAL);
    let mut level = None;

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(ControlSignal::TogglePause) => {
                    if let Some(Err(e)) = block_in_place(|| toggle_pause(&mut controller)) {
                        presenter.warn(&e.message);
                    }
                }
                Some(ControlSignal::Shutdown) | None => break,
            },
            Some(received) = levels.recv() => level = Some(received),
            _ = refresh.tick() => {
                let status = controller.status();
                if status.state == SessionState::Idle {
                    break;
                }
                let elapsed = status.elapsed_ms.unwrap_or(0);
                if limit_ms.is_some_and(|limit| elapsed >= limit) {
                    break;
                }
                let paused = status.state == SessionState::Paused;
                presenter.update_recording_progress(
                    paused,
                    elapsed,
                    limit_ms,
                    if paused { None } else { level },
                );
            }
        }
    }

    let stopped = block_in_place(|| {
        let _ = controller.handle(Command::StopVisualizer);
        controller.handle(Command::StopRecording)
    });

    match stopped {
        Ok(CommandResponse::Path {
            local_path: Some(path),
        }) => {
            presenter.spinner_success(&format!("Saved {}", path));
            presenter.output(&path);
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(_) => {
            presenter.spinner_fail("Recording ended without a file");
            ExitCode::from(EXIT_ERROR)
        }
        Err(e) => {
            presenter.spinner_fail(&e.message);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Show the live input level until a signal or the duration ends it
pub async fn run_meter(config: AppConfig, duration: Option<Duration>) -> ExitCode {
    let mut presenter = Presenter::new();

    let mut signals = match SignalHandler::new(false) {
        Ok(s) => s,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let (sink, mut levels) = amplitude_channel(LEVEL_BUFFER);
    let mut monitor = AmplitudeMonitor::new(create_source(&config), monitor_config(&config));
    if let Err(e) = block_in_place(|| monitor.start(Arc::new(sink))) {
        presenter.error(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }

    presenter.start_spinner("Listening");
    let started = Instant::now();
    let deadline = duration.map(|d| tokio::time::Instant::now() + d.as_std());
    let mut emissions: u64 = 0;

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(ControlSignal::TogglePause) => {}
                Some(ControlSignal::Shutdown) | None => break,
            },
            received = levels.recv() => match received {
                Some(level) => {
                    emissions += 1;
                    presenter.update_spinner(&presenter.format_level(level));
                }
                None => break,
            },
            _ = sleep_until(deadline) => break,
        }
    }

    block_in_place(|| monitor.stop());
    presenter.stop_spinner();
    debug!(
        emissions,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Meter stopped"
    );
    ExitCode::from(EXIT_SUCCESS)
}

/// Sleep until the deadline, or forever without one
async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Parse an optional duration flag
pub fn parse_duration_arg(value: Option<&str>) -> Result<Option<Duration>, String> {
    value
        .map(|s| {
            s.parse::<Duration>()
                .map_err(|e| format!("Invalid duration: {}", e))
        })
        .transpose()
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring config file: {}", e);
            AppConfig::empty()
        }
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}

/// Settings read from `MICPULSE_*` variables that have no CLI flag
fn env_config() -> AppConfig {
    let var = |name: &str| env::var(name).ok().filter(|s| !s.is_empty());
    AppConfig {
        source: var("MICPULSE_SOURCE"),
        emission_interval: var("MICPULSE_EMISSION_INTERVAL"),
        read_timeout: var("MICPULSE_READ_TIMEOUT"),
        ..Default::default()
    }
}
