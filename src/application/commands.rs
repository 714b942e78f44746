//! Command surface for host glue
//!
//! [`AudioController`] owns one recording session and one amplitude monitor
//! and answers the command table. Commands, replies and events serialise to
//! the JSON shapes used on the daemon socket:
//!
//! ```text
//! {"method":"startRecording","args":{"filePath":"/tmp/a.m4a"}}
//! {"ok":true}
//! {"ok":{"localPath":"/tmp/a.m4a"}}
//! {"error":{"code":"PAUSE_ERROR","message":"..."}}
//! {"event":"onAmplitude","value":0.42}
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::amplitude::Amplitude;
use crate::domain::recording::SessionState;

use super::ports::{AmplitudeSink, AudioSource, Recorder};
use super::recording::{RecordingSession, SessionError};
use super::visualizer::{AmplitudeMonitor, VisualizerError};

/// One request from host glue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "method",
    content = "args",
    rename_all = "camelCase",
    try_from = "WireCommand"
)]
pub enum Command {
    StartRecording {
        #[serde(rename = "filePath", default)]
        file_path: Option<String>,
    },
    StopRecording,
    PauseRecording,
    ResumeRecording,
    StartVisualizer,
    StopVisualizer,
    Status,
}

impl Command {
    /// Wire name of the command
    pub const fn method(&self) -> &'static str {
        match self {
            Self::StartRecording { .. } => "startRecording",
            Self::StopRecording => "stopRecording",
            Self::PauseRecording => "pauseRecording",
            Self::ResumeRecording => "resumeRecording",
            Self::StartVisualizer => "startVisualizer",
            Self::StopVisualizer => "stopVisualizer",
            Self::Status => "status",
        }
    }

    /// Error kind reported when the command fails as a whole
    pub const fn failure_kind(&self) -> ErrorKind {
        match self {
            Self::StartRecording { .. } | Self::Status => ErrorKind::RecordingError,
            Self::StopRecording => ErrorKind::StopError,
            Self::PauseRecording => ErrorKind::PauseError,
            Self::ResumeRecording => ErrorKind::ResumeError,
            Self::StartVisualizer | Self::StopVisualizer => ErrorKind::VisualizerError,
        }
    }

    /// Build a command from its wire name and optional path argument
    pub fn from_method(method: &str, path: Option<String>) -> Option<Self> {
        let command = match method {
            "startRecording" => Self::StartRecording { file_path: path },
            "stopRecording" => Self::StopRecording,
            "pauseRecording" => Self::PauseRecording,
            "resumeRecording" => Self::ResumeRecording,
            "startVisualizer" => Self::StartVisualizer,
            "stopVisualizer" => Self::StopVisualizer,
            "status" => Self::Status,
            _ => return None,
        };
        Some(command)
    }
}

/// Command as read off the wire; `args` may be absent or null
#[derive(Deserialize)]
struct WireCommand {
    method: String,
    #[serde(default)]
    args: Option<WireArgs>,
}

#[derive(Default, Deserialize)]
struct WireArgs {
    #[serde(rename = "filePath", default)]
    file_path: Option<String>,
}

impl TryFrom<WireCommand> for Command {
    type Error = String;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        let path = wire.args.unwrap_or_default().file_path;
        Self::from_method(&wire.method, path)
            .ok_or_else(|| format!("unknown method `{}`", wire.method))
    }
}

/// Snapshot returned by the status command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub state: SessionState,
    pub local_path: Option<String>,
    pub visualizer: bool,
    /// Recorded time excluding pauses
    pub elapsed_ms: Option<u64>,
}

/// Successful command payload.
///
/// Variant order matters for deserialisation: each shape must not be
/// accepted by a variant listed before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandResponse {
    /// `true`
    Started(bool),
    Status(StatusReport),
    /// `{"localPath": ...}`
    Path {
        #[serde(rename = "localPath")]
        local_path: Option<String>,
    },
    /// `null`
    Ack,
}

/// Error kinds of the command surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidArgument,
    Unsupported,
    RecordingError,
    PauseError,
    ResumeError,
    StopError,
    VisualizerError,
}

impl ErrorKind {
    /// Wire code
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unsupported => "UNSUPPORTED",
            Self::RecordingError => "RECORDING_ERROR",
            Self::PauseError => "PAUSE_ERROR",
            Self::ResumeError => "RESUME_ERROR",
            Self::StopError => "STOP_ERROR",
            Self::VisualizerError => "VISUALIZER_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<&SessionError> for ErrorKind {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::InvalidArgument(_) => Self::InvalidArgument,
            SessionError::Unsupported(_) => Self::Unsupported,
            SessionError::Recording(_) => Self::RecordingError,
            SessionError::Pause(_) => Self::PauseError,
            SessionError::Resume(_) => Self::ResumeError,
            SessionError::Stop(_) => Self::StopError,
        }
    }
}

/// A typed command failure
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CommandError {
    pub code: ErrorKind,
    pub message: String,
}

impl CommandError {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<SessionError> for CommandError {
    fn from(err: SessionError) -> Self {
        Self::new(ErrorKind::from(&err), err.to_string())
    }
}

impl From<VisualizerError> for CommandError {
    fn from(err: VisualizerError) -> Self {
        Self::new(ErrorKind::VisualizerError, err.to_string())
    }
}

/// Exactly one reply per command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reply {
    Ok(CommandResponse),
    Error(CommandError),
}

impl From<Result<CommandResponse, CommandError>> for Reply {
    fn from(result: Result<CommandResponse, CommandError>) -> Self {
        match result {
            Ok(response) => Self::Ok(response),
            Err(err) => Self::Error(err),
        }
    }
}

impl From<Reply> for Result<CommandResponse, CommandError> {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Ok(response) => Ok(response),
            Reply::Error(err) => Err(err),
        }
    }
}

/// Pushed to subscribers while the visualizer runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    OnAmplitude { value: f32 },
}

impl From<Amplitude> for Event {
    fn from(level: Amplitude) -> Self {
        Self::OnAmplitude {
            value: level.value(),
        }
    }
}

/// Owns one recording session and one amplitude monitor; the two share
/// nothing but this owner.
pub struct AudioController<R: Recorder, S: AudioSource + ?Sized + 'static> {
    session: RecordingSession<R>,
    monitor: AmplitudeMonitor<S>,
    sink: Arc<dyn AmplitudeSink>,
}

impl<R: Recorder, S: AudioSource + ?Sized + 'static> AudioController<R, S> {
    /// `sink` receives every amplitude emission while the visualizer runs
    pub fn new(
        session: RecordingSession<R>,
        monitor: AmplitudeMonitor<S>,
        sink: Arc<dyn AmplitudeSink>,
    ) -> Self {
        Self {
            session,
            monitor,
            sink,
        }
    }

    /// Get the recording session
    pub fn session(&self) -> &RecordingSession<R> {
        &self.session
    }

    /// Get the amplitude monitor
    pub fn monitor(&self) -> &AmplitudeMonitor<S> {
        &self.monitor
    }

    /// Run one command to completion
    pub fn handle(&mut self, command: Command) -> Result<CommandResponse, CommandError> {
        match command {
            Command::StartRecording { file_path } => {
                self.session.start(file_path.as_deref())?;
                Ok(CommandResponse::Started(true))
            }
            Command::StopRecording => {
                let stopped = self.session.stop()?;
                Ok(CommandResponse::Path {
                    local_path: stopped.map(|s| s.destination.to_local_path()),
                })
            }
            Command::PauseRecording => {
                let destination = self.session.pause()?;
                Ok(CommandResponse::Path {
                    local_path: Some(destination.to_local_path()),
                })
            }
            Command::ResumeRecording => {
                self.session.resume()?;
                Ok(CommandResponse::Started(true))
            }
            Command::StartVisualizer => {
                self.monitor.start(Arc::clone(&self.sink))?;
                Ok(CommandResponse::Ack)
            }
            Command::StopVisualizer => {
                self.monitor.stop();
                Ok(CommandResponse::Ack)
            }
            Command::Status => Ok(CommandResponse::Status(self.status())),
        }
    }

    /// Current session and visualizer state
    pub fn status(&self) -> StatusReport {
        StatusReport {
            state: self.session.state(),
            local_path: self.session.destination().map(|d| d.to_local_path()),
            visualizer: self.monitor.is_active(),
            elapsed_ms: self
                .session
                .lifecycle()
                .map(|l| l.active_duration().as_millis() as u64),
        }
    }

    /// Stop the visualizer and finalize any live recording
    pub fn shutdown(&mut self) -> Option<String> {
        self.monitor.stop();
        match self.session.stop() {
            Ok(stopped) => stopped.map(|s| s.destination.to_local_path()),
            Err(e) => {
                tracing::warn!("Recording did not finalize on shutdown: {}", e);
                None
            }
        }
    }
}
