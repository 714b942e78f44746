//! Amplitude monitor use case
//!
//! Runs a sampling loop on a dedicated worker thread: read one batch from an
//! independent capture stream, reduce it to an RMS level and hand the level
//! to an [`AmplitudeSink`], at a fixed cadence until stopped.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration as StdDuration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::amplitude::Amplitude;
use crate::domain::recording::{CaptureFormat, Duration};

use super::ports::{AmplitudeSink, AudioSource, CaptureError, PcmStream};

/// Errors from starting the visualizer
#[derive(Debug, Clone, Error)]
pub enum VisualizerError {
    #[error("Failed to start visualizer: {0}")]
    Capture(#[from] CaptureError),

    #[error("Visualizer worker failed: {0}")]
    Worker(String),
}

/// Sampling loop settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Format requested from the capture source
    pub format: CaptureFormat,
    /// Cadence between two emission cycles
    pub emission_interval: StdDuration,
    /// Upper bound for one blocking read; bounds shutdown latency
    pub read_timeout: StdDuration,
}

impl MonitorConfig {
    /// Override the emission interval
    pub fn with_emission_interval(mut self, interval: Duration) -> Self {
        self.emission_interval = interval.as_std();
        self
    }

    /// Override the read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout.as_std();
        self
    }

    /// Samples read per cycle: two intervals of audio, never below the
    /// smallest useful read for the stream's rate.
    fn batch_len(&self, stream_rate: u32) -> usize {
        let format = CaptureFormat {
            sample_rate: stream_rate,
            channels: self.format.channels,
        };
        let per_interval =
            (stream_rate as u128 * self.emission_interval.as_millis() / 1000) as usize;
        format.min_buffer_len().max(per_interval * 2)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            format: CaptureFormat::mono(),
            emission_interval: Duration::default_emission_interval().as_std(),
            read_timeout: Duration::default_read_timeout().as_std(),
        }
    }
}

/// The live sampling loop
struct Worker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Amplitude monitor.
///
/// At most one sampling loop is alive per monitor. `stop` returns only after
/// the loop has exited and its capture stream is dropped, so an immediate
/// `start` never races the previous stream for the device.
pub struct AmplitudeMonitor<S: AudioSource + ?Sized + 'static> {
    source: Arc<S>,
    config: MonitorConfig,
    worker: Option<Worker>,
}

impl<S: AudioSource + ?Sized + 'static> AmplitudeMonitor<S> {
    /// Create an inactive monitor reading from `source`
    pub fn new(source: Arc<S>, config: MonitorConfig) -> Self {
        Self {
            source,
            config,
            worker: None,
        }
    }

    /// Get the loop settings
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Whether a sampling loop is running
    pub fn is_active(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Start the sampling loop, delivering levels to `sink`.
    ///
    /// A no-op while already active. The capture stream is opened on the
    /// worker thread; failure to open it is reported here, once.
    pub fn start(&mut self, sink: Arc<dyn AmplitudeSink>) -> Result<(), VisualizerError> {
        if self.is_active() {
            debug!("Visualizer already active");
            return Ok(());
        }
        // Reap a loop that ended on its own
        self.stop();

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<u32, CaptureError>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let source = Arc::clone(&self.source);
        let config = self.config;

        let handle = thread::Builder::new()
            .name("amplitude-monitor".to_string())
            .spawn(move || {
                let mut stream = match source.open(config.format) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(stream.sample_rate()));
                sampling_loop(stream.as_mut(), sink.as_ref(), &stop_rx, &config);
                drop(stream);
                debug!("Visualizer stream released");
            })
            .map_err(|e| VisualizerError::Worker(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => {
                info!(
                    source = %self.source.name(),
                    sample_rate,
                    interval_ms = config.emission_interval.as_millis() as u64,
                    "Visualizer started"
                );
                self.worker = Some(Worker { stop_tx, handle });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                warn!("Visualizer could not open capture stream: {}", e);
                Err(e.into())
            }
            Err(_) => {
                let _ = handle.join();
                Err(VisualizerError::Worker(
                    "sampling thread exited before opening the stream".to_string(),
                ))
            }
        }
    }

    /// Stop the sampling loop and wait for it to release the stream.
    ///
    /// Idempotent.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // A finished loop has already dropped the receiver
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            warn!("Visualizer thread panicked");
        }
        info!("Visualizer stopped");
    }
}

impl<S: AudioSource + ?Sized + 'static> Drop for AmplitudeMonitor<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read, reduce, deliver, wait; until a stop signal arrives.
///
/// Cycles are paced from their start, so a slow read does not stretch the
/// cadence. Empty reads and read errors skip the emission.
fn sampling_loop(
    stream: &mut dyn PcmStream,
    sink: &dyn AmplitudeSink,
    stop_rx: &mpsc::Receiver<()>,
    config: &MonitorConfig,
) {
    let mut buffer = vec![0i16; config.batch_len(stream.sample_rate())];

    loop {
        let cycle_start = Instant::now();

        match stream.read(&mut buffer, config.read_timeout) {
            Ok(0) => {}
            Ok(n) => {
                if let Some(level) = Amplitude::from_rms(&buffer[..n]) {
                    sink.deliver(level);
                }
            }
            Err(e) => debug!("Skipping amplitude cycle: {}", e),
        }

        let wait = config
            .emission_interval
            .saturating_sub(cycle_start.elapsed());
        match stop_rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => continue,
            // Stop requested or the monitor is gone
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Source producing a constant sample value, instantly
    struct ConstSource {
        value: i16,
        open_streams: Arc<AtomicUsize>,
    }

    struct ConstStream {
        value: i16,
        open_streams: Arc<AtomicUsize>,
    }

    impl AudioSource for ConstSource {
        fn open(&self, format: CaptureFormat) -> Result<Box<dyn PcmStream>, CaptureError> {
            let _ = format;
            self.open_streams.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ConstStream {
                value: self.value,
                open_streams: Arc::clone(&self.open_streams),
            }))
        }

        fn name(&self) -> String {
            "const".to_string()
        }
    }

    impl PcmStream for ConstStream {
        fn sample_rate(&self) -> u32 {
            44_100
        }

        fn read(&mut self, buf: &mut [i16], _timeout: StdDuration) -> Result<usize, CaptureError> {
            buf.fill(self.value);
            Ok(buf.len())
        }
    }

    impl Drop for ConstStream {
        fn drop(&mut self) {
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// One scripted read result
    #[derive(Clone, Copy)]
    enum Step {
        Empty,
        Fail,
        Samples(i16),
    }

    /// Source replaying a fixed script of reads, then reading nothing
    struct ScriptedSource {
        script: Vec<Step>,
        open_streams: Arc<AtomicUsize>,
    }

    struct ScriptedStream {
        script: std::collections::VecDeque<Step>,
        open_streams: Arc<AtomicUsize>,
    }

    impl AudioSource for ScriptedSource {
        fn open(&self, _format: CaptureFormat) -> Result<Box<dyn PcmStream>, CaptureError> {
            self.open_streams.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedStream {
                script: self.script.iter().copied().collect(),
                open_streams: Arc::clone(&self.open_streams),
            }))
        }

        fn name(&self) -> String {
            "scripted".to_string()
        }
    }

    impl PcmStream for ScriptedStream {
        fn sample_rate(&self) -> u32 {
            44_100
        }

        fn read(&mut self, buf: &mut [i16], _timeout: StdDuration) -> Result<usize, CaptureError> {
            match self.script.pop_front().unwrap_or(Step::Empty) {
                Step::Empty => Ok(0),
                Step::Fail => Err(CaptureError::StreamFailed("device hiccup".into())),
                Step::Samples(value) => {
                    let n = buf.len().min(441);
                    buf[..n].fill(value);
                    Ok(n)
                }
            }
        }
    }

    impl Drop for ScriptedStream {
        fn drop(&mut self) {
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct FailingSource;

    impl AudioSource for FailingSource {
        fn open(&self, _format: CaptureFormat) -> Result<Box<dyn PcmStream>, CaptureError> {
            Err(CaptureError::Unavailable("permission denied".into()))
        }

        fn name(&self) -> String {
            "failing".to_string()
        }
    }

    fn collecting_sink() -> (Arc<dyn AmplitudeSink>, Arc<Mutex<Vec<Amplitude>>>) {
        let levels = Arc::new(Mutex::new(Vec::new()));
        let collected = Arc::clone(&levels);
        let sink = move |level: Amplitude| collected.lock().unwrap().push(level);
        (Arc::new(sink), levels)
    }

    fn const_monitor(value: i16) -> (AmplitudeMonitor<ConstSource>, Arc<AtomicUsize>) {
        let open_streams = Arc::new(AtomicUsize::new(0));
        let source = ConstSource {
            value,
            open_streams: Arc::clone(&open_streams),
        };
        (
            AmplitudeMonitor::new(Arc::new(source), MonitorConfig::default()),
            open_streams,
        )
    }

    #[test]
    fn batch_covers_two_intervals() {
        let config = MonitorConfig::default();
        assert_eq!(config.batch_len(44_100), 4410);
    }

    #[test]
    fn batch_never_below_minimum() {
        let config = MonitorConfig {
            emission_interval: StdDuration::from_millis(1),
            ..MonitorConfig::default()
        };
        assert_eq!(config.batch_len(44_100), 1764);
    }

    #[test]
    fn emits_levels_until_stopped() {
        let (mut monitor, open_streams) = const_monitor(i16::MAX);
        let (sink, levels) = collecting_sink();

        monitor.start(sink).unwrap();
        assert!(monitor.is_active());
        thread::sleep(StdDuration::from_millis(200));
        monitor.stop();

        assert!(!monitor.is_active());
        assert_eq!(open_streams.load(Ordering::SeqCst), 0);
        let levels = levels.lock().unwrap();
        assert!(!levels.is_empty());
        assert!(levels.iter().all(|l| (l.value() - 1.0).abs() < 1e-4));
    }

    #[test]
    fn start_while_active_is_noop() {
        let (mut monitor, open_streams) = const_monitor(0);
        let (sink, _) = collecting_sink();
        monitor.start(Arc::clone(&sink)).unwrap();
        monitor.start(sink).unwrap();
        assert_eq!(open_streams.load(Ordering::SeqCst), 1);
        monitor.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut monitor, _) = const_monitor(0);
        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_active());
    }

    #[test]
    fn open_failure_is_reported() {
        let mut monitor = AmplitudeMonitor::new(Arc::new(FailingSource), MonitorConfig::default());
        let (sink, levels) = collecting_sink();
        let err = monitor.start(sink).unwrap_err();
        assert!(matches!(err, VisualizerError::Capture(_)));
        assert!(!monitor.is_active());
        assert!(levels.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_reads_and_read_errors_skip_the_cycle() {
        let open_streams = Arc::new(AtomicUsize::new(0));
        let source = ScriptedSource {
            script: vec![Step::Empty, Step::Fail, Step::Samples(i16::MAX), Step::Fail],
            open_streams: Arc::clone(&open_streams),
        };
        let config = MonitorConfig {
            emission_interval: StdDuration::from_millis(10),
            ..MonitorConfig::default()
        };
        let mut monitor = AmplitudeMonitor::new(Arc::new(source), config);
        let (sink, levels) = collecting_sink();

        monitor.start(sink).unwrap();
        thread::sleep(StdDuration::from_millis(150));

        // The loop survived the failed reads and keeps polling
        assert!(monitor.is_active());
        {
            let levels = levels.lock().unwrap();
            assert_eq!(levels.len(), 1);
            assert!((levels[0].value() - 1.0).abs() < 1e-4);
        }

        monitor.stop();
        assert!(!monitor.is_active());
        assert_eq!(open_streams.load(Ordering::SeqCst), 0);
        assert_eq!(levels.lock().unwrap().len(), 1);
    }
}
