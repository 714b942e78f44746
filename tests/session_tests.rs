//! Recording session integration tests on the synthetic tone source

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use micpulse::application::ports::AudioSource;
use micpulse::application::{RecordingSession, SessionError};
use micpulse::domain::recording::SessionState;
use micpulse::infrastructure::{FormatEncoder, PipelineRecorder, ToneSource};

type ToneRecorder = PipelineRecorder<dyn AudioSource, FormatEncoder>;

fn tone_session() -> RecordingSession<ToneRecorder> {
    let source: Arc<dyn AudioSource> = Arc::new(ToneSource::new());
    let recorder = PipelineRecorder::new(source, Arc::new(FormatEncoder::new("ffmpeg")));
    RecordingSession::new(recorder)
}

fn path_in(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().to_string()
}

#[test]
fn start_stop_writes_wav() {
    let dir = TempDir::new().unwrap();
    let path = path_in(&dir, "take.wav");
    let mut session = tone_session();

    let destination = session.start(Some(&path)).unwrap();
    assert_eq!(destination.to_local_path(), path);
    assert_eq!(session.state(), SessionState::Recording);

    thread::sleep(Duration::from_millis(300));
    let stopped = session.stop().unwrap().expect("a session was live");

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(stopped.destination.to_local_path(), path);
    assert!(stopped.summary.bytes > 44);
    assert!(stopped.summary.captured >= Duration::from_millis(100));

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, 44_100);
    assert!(reader.len() > 0);
}

#[test]
fn flac_file_has_stream_marker() {
    let dir = TempDir::new().unwrap();
    let path = path_in(&dir, "take.flac");
    let mut session = tone_session();

    session.start(Some(&path)).unwrap();
    thread::sleep(Duration::from_millis(200));
    session.stop().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], b"fLaC");
}

#[test]
fn pause_resume_cycle() {
    let dir = TempDir::new().unwrap();
    let path = path_in(&dir, "paused.wav");
    let mut session = tone_session();

    session.start(Some(&path)).unwrap();
    thread::sleep(Duration::from_millis(100));

    let paused_at = session.pause().unwrap().to_local_path();
    assert_eq!(paused_at, path);
    assert_eq!(session.state(), SessionState::Paused);

    // Second pause is a state error, not a no-op
    assert!(matches!(session.pause(), Err(SessionError::Pause(_))));

    thread::sleep(Duration::from_millis(400));
    session.resume().unwrap();
    assert_eq!(session.state(), SessionState::Recording);
    assert!(matches!(session.resume(), Err(SessionError::Resume(_))));

    thread::sleep(Duration::from_millis(100));
    let stopped = session.stop().unwrap().unwrap();
    // Paused audio is dropped, so well under the wall-clock time was kept
    assert!(stopped.summary.captured < Duration::from_millis(450));
}

#[test]
fn second_start_finalizes_first_file() {
    let dir = TempDir::new().unwrap();
    let first = path_in(&dir, "first.wav");
    let second = path_in(&dir, "second.wav");
    let mut session = tone_session();

    session.start(Some(&first)).unwrap();
    thread::sleep(Duration::from_millis(150));
    session.start(Some(&second)).unwrap();

    // The first file is complete and readable while the second is live
    let reader = hound::WavReader::open(&first).unwrap();
    assert!(reader.len() > 0);
    assert_eq!(
        session.destination().map(|d| d.to_local_path()),
        Some(second.clone())
    );

    thread::sleep(Duration::from_millis(100));
    let stopped = session.stop().unwrap().unwrap();
    assert_eq!(stopped.destination.to_local_path(), second);
}

#[test]
fn stop_when_idle_is_none() {
    let mut session = tone_session();
    assert!(session.stop().unwrap().is_none());
    assert!(session.stop().unwrap().is_none());
}

#[test]
fn idle_pause_and_resume_fail() {
    let mut session = tone_session();
    assert!(matches!(session.pause(), Err(SessionError::Pause(_))));
    assert!(matches!(session.resume(), Err(SessionError::Resume(_))));
}

#[test]
fn invalid_destination_leaves_session_untouched() {
    let dir = TempDir::new().unwrap();
    let path = path_in(&dir, "keep.wav");
    let mut session = tone_session();
    session.start(Some(&path)).unwrap();

    assert!(matches!(
        session.start(None),
        Err(SessionError::InvalidArgument(_))
    ));
    assert!(matches!(
        session.start(Some("  ")),
        Err(SessionError::InvalidArgument(_))
    ));
    let dir_path = dir.path().to_string_lossy().to_string();
    assert!(matches!(
        session.start(Some(&dir_path)),
        Err(SessionError::InvalidArgument(_))
    ));

    assert_eq!(session.state(), SessionState::Recording);
    assert_eq!(
        session.destination().map(|d| d.to_local_path()),
        Some(path)
    );
    session.stop().unwrap();
}

#[test]
fn missing_ffmpeg_reports_recording_error() {
    let dir = TempDir::new().unwrap();
    let path = path_in(&dir, "take.m4a");
    let source: Arc<dyn AudioSource> = Arc::new(ToneSource::new());
    let encoder = Arc::new(FormatEncoder::new("/nonexistent/ffmpeg-binary"));
    let mut session = RecordingSession::new(PipelineRecorder::new(source, encoder));

    assert!(matches!(
        session.start(Some(&path)),
        Err(SessionError::Recording(_))
    ));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!std::path::Path::new(&path).exists());
}

#[test]
fn dropping_session_finalizes_file() {
    let dir = TempDir::new().unwrap();
    let path = path_in(&dir, "dropped.wav");
    {
        let mut session = tone_session();
        session.start(Some(&path)).unwrap();
        thread::sleep(Duration::from_millis(100));
    }
    let reader = hound::WavReader::open(&path).unwrap();
    assert!(reader.len() > 0);
}
