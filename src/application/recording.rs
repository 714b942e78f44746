//! Recording session use case

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::error::DestinationError;
use crate::domain::recording::{
    Destination, EncodingParams, InvalidStateTransition, RecordingLifecycle, SessionState,
};

use super::ports::{ActiveRecording, FinalizedRecording, Recorder, RecorderError};

/// Errors from recording lifecycle operations
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("{0}")]
    InvalidArgument(#[from] DestinationError),

    #[error("{0}")]
    Unsupported(String),

    #[error("Failed to start recording: {0}")]
    Recording(RecorderError),

    #[error("Failed to pause recording: {0}")]
    Pause(String),

    #[error("Failed to resume recording: {0}")]
    Resume(String),

    #[error("Failed to stop recording: {0}")]
    Stop(String),
}

/// Outcome of stopping an active session
#[derive(Debug, Clone)]
pub struct StoppedRecording {
    pub destination: Destination,
    pub summary: FinalizedRecording,
}

/// A live session: the lifecycle and the recorder handle it owns.
struct ActiveSession {
    lifecycle: RecordingLifecycle,
    handle: Box<dyn ActiveRecording>,
}

/// Recording session use case.
///
/// Owns at most one live recording. Every operation runs synchronously on the
/// caller's thread; encoder open/close are short blocking calls.
///
/// State machine:
///   IDLE -> RECORDING (start)
///   RECORDING -> PAUSED (pause)
///   PAUSED -> RECORDING (resume)
///   RECORDING | PAUSED -> IDLE (stop, start of a new session, error)
pub struct RecordingSession<R: Recorder> {
    recorder: R,
    params: EncodingParams,
    active: Option<ActiveSession>,
}

impl<R: Recorder> RecordingSession<R> {
    /// Create an idle session using the standard encoding parameters
    pub fn new(recorder: R) -> Self {
        Self::with_params(recorder, EncodingParams::standard())
    }

    /// Create an idle session with custom encoding parameters
    pub fn with_params(recorder: R, params: EncodingParams) -> Self {
        Self {
            recorder,
            params,
            active: None,
        }
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.active
            .as_ref()
            .map(|a| a.lifecycle.state())
            .unwrap_or(SessionState::Idle)
    }

    /// Destination of the live session, if any
    pub fn destination(&self) -> Option<&Destination> {
        self.active.as_ref().map(|a| a.lifecycle.destination())
    }

    /// Active lifecycle, if any (timestamps, durations)
    pub fn lifecycle(&self) -> Option<&RecordingLifecycle> {
        self.active.as_ref().map(|a| &a.lifecycle)
    }

    /// Encoding parameters new sessions are opened with
    pub fn params(&self) -> &EncodingParams {
        &self.params
    }

    /// Start recording to `path`.
    ///
    /// A live session is finalized first; failures of that implicit stop are
    /// logged, not surfaced. On error the session is left idle.
    pub fn start(&mut self, path: Option<&str>) -> Result<&Destination, SessionError> {
        let destination = Destination::parse(path)?;

        if let Some(previous) = self.active.take() {
            let previous_path = previous.lifecycle.destination().to_string();
            match previous.handle.finalize() {
                Ok(summary) => debug!(
                    path = %previous_path,
                    bytes = summary.bytes,
                    "Finalized previous recording before restart"
                ),
                Err(e) => warn!(path = %previous_path, "Previous recording did not finalize cleanly: {}", e),
            }
        }

        let handle = self
            .recorder
            .begin(&destination, &self.params)
            .map_err(SessionError::Recording)?;

        info!(
            path = %destination,
            format = %destination.format(),
            sample_rate = self.params.sample_rate,
            bitrate = self.params.bitrate,
            "Recording started"
        );

        let active = self.active.insert(ActiveSession {
            lifecycle: RecordingLifecycle::begin(destination),
            handle,
        });
        Ok(active.lifecycle.destination())
    }

    /// Pause the live session, returning its destination
    pub fn pause(&mut self) -> Result<&Destination, SessionError> {
        if !self.recorder.supports_pause() {
            return Err(SessionError::Unsupported(
                "Pause not supported by this recorder".to_string(),
            ));
        }
        let active = self.active.as_mut().ok_or_else(|| {
            SessionError::Pause(not_active("pause").to_string())
        })?;

        if !active.lifecycle.is_recording() {
            return Err(SessionError::Pause(
                InvalidStateTransition {
                    current_state: active.lifecycle.state(),
                    action: "pause".to_string(),
                }
                .to_string(),
            ));
        }
        active
            .handle
            .pause()
            .map_err(|e| SessionError::Pause(e.to_string()))?;
        active
            .lifecycle
            .pause()
            .map_err(|e| SessionError::Pause(e.to_string()))?;

        info!(path = %active.lifecycle.destination(), "Recording paused");
        Ok(active.lifecycle.destination())
    }

    /// Resume a paused session
    pub fn resume(&mut self) -> Result<(), SessionError> {
        if !self.recorder.supports_pause() {
            return Err(SessionError::Unsupported(
                "Resume not supported by this recorder".to_string(),
            ));
        }
        let active = self.active.as_mut().ok_or_else(|| {
            SessionError::Resume(not_active("resume").to_string())
        })?;

        if !active.lifecycle.is_paused() {
            return Err(SessionError::Resume(
                InvalidStateTransition {
                    current_state: active.lifecycle.state(),
                    action: "resume".to_string(),
                }
                .to_string(),
            ));
        }
        active
            .handle
            .resume()
            .map_err(|e| SessionError::Resume(e.to_string()))?;
        active
            .lifecycle
            .resume()
            .map_err(|e| SessionError::Resume(e.to_string()))?;

        info!(path = %active.lifecycle.destination(), "Recording resumed");
        Ok(())
    }

    /// Stop and finalize the live session.
    ///
    /// Idempotent: returns `Ok(None)` when idle. The session is idle after
    /// this call even when finalization fails.
    pub fn stop(&mut self) -> Result<Option<StoppedRecording>, SessionError> {
        let Some(active) = self.active.take() else {
            debug!("Stop requested while idle");
            return Ok(None);
        };

        let ActiveSession { lifecycle, handle } = active;
        let result = handle.finalize();
        let destination = lifecycle.finish();

        match result {
            Ok(summary) => {
                info!(
                    path = %destination,
                    bytes = summary.bytes,
                    seconds = summary.captured.as_secs_f32(),
                    "Recording stopped"
                );
                Ok(Some(StoppedRecording {
                    destination,
                    summary,
                }))
            }
            Err(e) => {
                warn!(path = %destination, "Recording finalize failed: {}", e);
                Err(SessionError::Stop(format!("{} ({})", e, destination)))
            }
        }
    }
}

impl<R: Recorder> Drop for RecordingSession<R> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            // Best-effort: the file may still be usable
            if let Err(e) = active.handle.finalize() {
                warn!("Recording finalize on shutdown failed: {}", e);
            }
        }
    }
}

fn not_active(action: &str) -> InvalidStateTransition {
    InvalidStateTransition {
        current_state: SessionState::Idle,
        action: action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::application::ports::CaptureError;

    #[derive(Default)]
    struct Counters {
        live: AtomicUsize,
        begun: AtomicUsize,
        fail_begin: AtomicBool,
        fail_finalize: AtomicBool,
    }

    struct MockRecorder {
        counters: Arc<Counters>,
        pausable: bool,
    }

    struct MockHandle {
        counters: Arc<Counters>,
    }

    impl Recorder for MockRecorder {
        fn begin(
            &self,
            _destination: &Destination,
            _params: &EncodingParams,
        ) -> Result<Box<dyn ActiveRecording>, RecorderError> {
            if self.counters.fail_begin.load(Ordering::SeqCst) {
                return Err(CaptureError::Unavailable("device busy".into()).into());
            }
            self.counters.live.fetch_add(1, Ordering::SeqCst);
            self.counters.begun.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockHandle {
                counters: Arc::clone(&self.counters),
            }))
        }

        fn supports_pause(&self) -> bool {
            self.pausable
        }
    }

    impl ActiveRecording for MockHandle {
        fn pause(&mut self) -> Result<(), RecorderError> {
            Ok(())
        }

        fn resume(&mut self) -> Result<(), RecorderError> {
            Ok(())
        }

        fn finalize(self: Box<Self>) -> Result<FinalizedRecording, RecorderError> {
            if self.counters.fail_finalize.load(Ordering::SeqCst) {
                return Err(RecorderError::Worker("disk full".into()));
            }
            Ok(FinalizedRecording {
                bytes: 42,
                captured: Duration::from_millis(10),
            })
        }
    }

    impl Drop for MockHandle {
        fn drop(&mut self) {
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn session(pausable: bool) -> (RecordingSession<MockRecorder>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let recorder = MockRecorder {
            counters: Arc::clone(&counters),
            pausable,
        };
        (RecordingSession::new(recorder), counters)
    }

    #[test]
    fn new_session_is_idle() {
        let (session, _) = session(true);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.destination().is_none());
    }

    #[test]
    fn start_rejects_missing_path() {
        let (mut session, counters) = session(true);
        let err = session.start(None).unwrap_err();
        assert!(matches!(err, SessionError::InvalidArgument(_)));
        assert_eq!(counters.begun.load(Ordering::SeqCst), 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn start_failure_leaves_idle() {
        let (mut session, counters) = session(true);
        counters.fail_begin.store(true, Ordering::SeqCst);
        let err = session.start(Some("/tmp/a.m4a")).unwrap_err();
        assert!(matches!(err, SessionError::Recording(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn restart_releases_previous_handle() {
        let (mut session, counters) = session(true);
        session.start(Some("/tmp/a.m4a")).unwrap();
        session.start(Some("/tmp/b.m4a")).unwrap();
        assert_eq!(counters.live.load(Ordering::SeqCst), 1);
        assert_eq!(counters.begun.load(Ordering::SeqCst), 2);
        assert_eq!(session.destination().unwrap().to_local_path(), "/tmp/b.m4a");
    }

    #[test]
    fn pause_and_resume_alternate() {
        let (mut session, _) = session(true);
        session.start(Some("/tmp/a.m4a")).unwrap();

        let path = session.pause().unwrap().to_local_path();
        assert_eq!(path, "/tmp/a.m4a");
        assert_eq!(session.state(), SessionState::Paused);
        assert!(matches!(session.pause(), Err(SessionError::Pause(_))));

        session.resume().unwrap();
        assert_eq!(session.state(), SessionState::Recording);
        assert!(matches!(session.resume(), Err(SessionError::Resume(_))));
    }

    #[test]
    fn unsupported_pause_keeps_state() {
        let (mut session, _) = session(false);
        session.start(Some("/tmp/a.m4a")).unwrap();
        assert!(matches!(session.pause(), Err(SessionError::Unsupported(_))));
        assert!(matches!(session.resume(), Err(SessionError::Unsupported(_))));
        assert_eq!(session.state(), SessionState::Recording);
    }

    #[test]
    fn pause_while_idle_fails() {
        let (mut session, _) = session(true);
        assert!(matches!(session.pause(), Err(SessionError::Pause(_))));
        assert!(matches!(session.resume(), Err(SessionError::Resume(_))));
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut session, _) = session(true);
        assert!(session.stop().unwrap().is_none());
        assert!(session.stop().unwrap().is_none());
    }

    #[test]
    fn stop_returns_destination() {
        let (mut session, counters) = session(true);
        session.start(Some("/tmp/a.m4a")).unwrap();
        let stopped = session.stop().unwrap().unwrap();
        assert_eq!(stopped.destination.to_local_path(), "/tmp/a.m4a");
        assert_eq!(stopped.summary.bytes, 42);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(counters.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_stop_still_goes_idle() {
        let (mut session, counters) = session(true);
        session.start(Some("/tmp/a.m4a")).unwrap();
        counters.fail_finalize.store(true, Ordering::SeqCst);

        let err = session.stop().unwrap_err();
        assert!(matches!(err, SessionError::Stop(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(counters.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn drop_releases_handle() {
        let (mut session, counters) = session(true);
        session.start(Some("/tmp/a.m4a")).unwrap();
        drop(session);
        assert_eq!(counters.live.load(Ordering::SeqCst), 0);
    }
}
