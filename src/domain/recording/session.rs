//! Recording session state machine

use std::fmt;
use std::time::{Duration as StdDuration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::destination::Destination;

/// Recording session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Paused,
}

impl SessionState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: SessionState,
    pub action: String,
}

/// Lifecycle of one live recording session.
///
/// A lifecycle only exists while a session holds a device, so its state is
/// always `Recording` or `Paused`; `Idle` is the absence of a lifecycle.
///
/// State machine:
///   (begin) -> RECORDING
///   RECORDING -> PAUSED (pause)
///   PAUSED -> RECORDING (resume)
///   RECORDING | PAUSED -> (finish)
#[derive(Debug)]
pub struct RecordingLifecycle {
    destination: Destination,
    state: SessionState,
    started_at: SystemTime,
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: StdDuration,
}

impl RecordingLifecycle {
    /// Begin a session in the recording state
    pub fn begin(destination: Destination) -> Self {
        Self {
            destination,
            state: SessionState::Recording,
            started_at: SystemTime::now(),
            started: Instant::now(),
            paused_at: None,
            paused_total: StdDuration::ZERO,
        }
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get the destination this session writes to
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Wall-clock time the session began
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Monotonic time the current pause began, if paused
    pub fn paused_at(&self) -> Option<Instant> {
        self.paused_at
    }

    /// Check if currently recording
    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// Check if currently paused
    pub fn is_paused(&self) -> bool {
        self.state == SessionState::Paused
    }

    /// Transition from RECORDING to PAUSED
    pub fn pause(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != SessionState::Recording {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: "pause".to_string(),
            });
        }
        self.state = SessionState::Paused;
        self.paused_at = Some(Instant::now());
        Ok(())
    }

    /// Transition from PAUSED to RECORDING
    pub fn resume(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != SessionState::Paused {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: "resume".to_string(),
            });
        }
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += paused_at.elapsed();
        }
        self.state = SessionState::Recording;
        Ok(())
    }

    /// Time spent recording, excluding pauses
    pub fn active_duration(&self) -> StdDuration {
        let current_pause = self
            .paused_at
            .map(|p| p.elapsed())
            .unwrap_or(StdDuration::ZERO);
        self.started
            .elapsed()
            .saturating_sub(self.paused_total + current_pause)
    }

    /// End the session, yielding its destination
    pub fn finish(self) -> Destination {
        self.destination
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle() -> RecordingLifecycle {
        RecordingLifecycle::begin(Destination::parse(Some("/tmp/a.m4a")).unwrap())
    }

    #[test]
    fn begins_recording() {
        let session = lifecycle();
        assert!(session.is_recording());
        assert!(!session.is_paused());
        assert!(session.paused_at().is_none());
        assert_eq!(session.destination().to_local_path(), "/tmp/a.m4a");
    }

    #[test]
    fn pause_from_recording() {
        let mut session = lifecycle();
        assert!(session.pause().is_ok());
        assert!(session.is_paused());
        assert!(session.paused_at().is_some());
    }

    #[test]
    fn pause_from_paused_fails() {
        let mut session = lifecycle();
        session.pause().unwrap();

        let err = session.pause().unwrap_err();
        assert_eq!(err.current_state, SessionState::Paused);
        assert!(err.action.contains("pause"));
        assert!(session.is_paused());
    }

    #[test]
    fn resume_from_paused() {
        let mut session = lifecycle();
        session.pause().unwrap();

        assert!(session.resume().is_ok());
        assert!(session.is_recording());
        assert!(session.paused_at().is_none());
    }

    #[test]
    fn resume_from_recording_fails() {
        let mut session = lifecycle();

        let err = session.resume().unwrap_err();
        assert_eq!(err.current_state, SessionState::Recording);
        assert!(session.is_recording());
    }

    #[test]
    fn pause_and_resume_alternate() {
        let mut session = lifecycle();
        for _ in 0..3 {
            session.pause().unwrap();
            session.resume().unwrap();
        }
        assert!(session.is_recording());
    }

    #[test]
    fn active_duration_excludes_pause() {
        let mut session = lifecycle();
        session.pause().unwrap();
        std::thread::sleep(StdDuration::from_millis(30));
        let paused = session.active_duration();
        std::thread::sleep(StdDuration::from_millis(30));
        assert!(session.active_duration() <= paused + StdDuration::from_millis(5));
    }

    #[test]
    fn finish_yields_destination() {
        let session = lifecycle();
        assert_eq!(session.finish().to_local_path(), "/tmp/a.m4a");
    }

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Recording.to_string(), "recording");
        assert_eq!(SessionState::Paused.to_string(), "paused");
    }

    #[test]
    fn error_display() {
        let err = InvalidStateTransition {
            current_state: SessionState::Paused,
            action: "pause".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pause"));
        assert!(msg.contains("paused"));
    }
}
