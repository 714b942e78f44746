//! Capture-to-file recorder
//!
//! A writer thread owns the capture stream: it reads batches, drops them
//! while paused, resamples to the target rate and feeds the encoder. The
//! stream is opened on that thread because cpal streams cannot move between
//! threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use tracing::{debug, info, warn};

use super::resample::StreamResampler;
use crate::application::ports::{
    ActiveRecording, AudioEncoder, AudioSource, CaptureError, EncoderSink, FinalizedRecording,
    PcmStream, Recorder, RecorderError,
};
use crate::domain::recording::{CaptureFormat, Destination, Duration, EncodingParams};

/// Recorder wiring an [`AudioSource`] to an [`AudioEncoder`]
pub struct PipelineRecorder<S, E>
where
    S: AudioSource + ?Sized + 'static,
    E: AudioEncoder + ?Sized + 'static,
{
    source: Arc<S>,
    encoder: Arc<E>,
    read_timeout: StdDuration,
}

impl<S, E> PipelineRecorder<S, E>
where
    S: AudioSource + ?Sized + 'static,
    E: AudioEncoder + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, encoder: Arc<E>) -> Self {
        Self {
            source,
            encoder,
            read_timeout: Duration::default_read_timeout().as_std(),
        }
    }

    /// Bound for one capture read; also bounds how long finalize waits
    /// for the writer to notice the stop signal.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout.as_std();
        self
    }
}

impl<S, E> Recorder for PipelineRecorder<S, E>
where
    S: AudioSource + ?Sized + 'static,
    E: AudioEncoder + ?Sized + 'static,
{
    fn begin(
        &self,
        destination: &Destination,
        params: &EncodingParams,
    ) -> Result<Box<dyn ActiveRecording>, RecorderError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<u32, RecorderError>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let paused = Arc::new(AtomicBool::new(false));

        let source = Arc::clone(&self.source);
        let encoder = Arc::clone(&self.encoder);
        let destination = destination.clone();
        let params = *params;
        let read_timeout = self.read_timeout;
        let writer_paused = Arc::clone(&paused);

        let thread = thread::Builder::new()
            .name("recording-writer".to_string())
            .spawn(move || {
                let mut stream = match source.open(params.capture_format()) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return Err(RecorderError::Worker("capture not started".into()));
                    }
                };
                let stream_rate = stream.sample_rate();
                let setup = StreamResampler::new(stream_rate, params.sample_rate)
                    .and_then(|resampler| {
                        encoder
                            .open(&destination, &params)
                            .map(|sink| (resampler, sink))
                    });
                let (resampler, sink) = match setup {
                    Ok(parts) => parts,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return Err(RecorderError::Worker("encoder not started".into()));
                    }
                };
                if !resampler.is_passthrough() {
                    info!(
                        from = stream_rate,
                        to = params.sample_rate,
                        "Resampling capture stream"
                    );
                }
                let _ = ready_tx.send(Ok(stream_rate));

                let writer = Writer {
                    stream: stream.as_mut(),
                    resampler,
                    sink,
                    paused: &writer_paused,
                    stop_rx: &stop_rx,
                    read_timeout,
                    sample_rate: params.sample_rate,
                };
                writer.run()
            })
            .map_err(|e| RecorderError::Worker(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(stream_rate)) => {
                debug!(
                    source = %self.source.name(),
                    stream_rate,
                    "Capture started"
                );
                Ok(Box::new(PipelineHandle {
                    stop_tx,
                    paused,
                    thread: Some(thread),
                }))
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(RecorderError::Worker(
                    "writer thread exited before capture started".into(),
                ))
            }
        }
    }

    fn supports_pause(&self) -> bool {
        true
    }
}

/// Writer thread state for one recording
struct Writer<'a> {
    stream: &'a mut dyn PcmStream,
    resampler: StreamResampler,
    sink: Box<dyn EncoderSink>,
    paused: &'a AtomicBool,
    stop_rx: &'a mpsc::Receiver<()>,
    read_timeout: StdDuration,
    sample_rate: u32,
}

impl Writer<'_> {
    fn run(mut self) -> Result<FinalizedRecording, RecorderError> {
        let format = CaptureFormat {
            sample_rate: self.stream.sample_rate(),
            channels: 1,
        };
        let mut buffer = vec![0i16; format.min_buffer_len()];
        let mut written: u64 = 0;

        loop {
            match self.stop_rx.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Disconnected) => break,
            }

            let n = match self.stream.read(&mut buffer, self.read_timeout) {
                Ok(n) => n,
                Err(CaptureError::StreamFailed(message)) => {
                    warn!("Capture stream hiccup: {}", message);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if n == 0 || self.paused.load(Ordering::SeqCst) {
                continue;
            }

            let converted = self.resampler.process(&buffer[..n])?;
            self.sink.write(&converted)?;
            written += converted.len() as u64;
        }

        let tail = self.resampler.flush()?;
        self.sink.write(&tail)?;
        written += tail.len() as u64;

        let bytes = self.sink.finish()?;
        let captured =
            StdDuration::from_secs_f64(written as f64 / self.sample_rate.max(1) as f64);
        debug!(samples = written, bytes, "Writer finished");
        Ok(FinalizedRecording { bytes, captured })
    }
}

/// Handle to a running pipeline
struct PipelineHandle {
    stop_tx: mpsc::Sender<()>,
    paused: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<FinalizedRecording, RecorderError>>>,
}

impl PipelineHandle {
    fn ensure_running(&self) -> Result<(), RecorderError> {
        match &self.thread {
            Some(thread) if !thread.is_finished() => Ok(()),
            _ => Err(RecorderError::Worker("capture has ended".into())),
        }
    }

    fn join(&mut self) -> Result<FinalizedRecording, RecorderError> {
        let thread = self
            .thread
            .take()
            .ok_or_else(|| RecorderError::Worker("recording already finalized".into()))?;
        let _ = self.stop_tx.send(());
        thread
            .join()
            .map_err(|_| RecorderError::Worker("writer thread panicked".into()))?
    }
}

impl ActiveRecording for PipelineHandle {
    fn pause(&mut self) -> Result<(), RecorderError> {
        self.ensure_running()?;
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), RecorderError> {
        self.ensure_running()?;
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<FinalizedRecording, RecorderError> {
        self.join()
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.join() {
                warn!("Recording abandoned without clean finalize: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::application::ports::EncoderError;

    #[derive(Clone, Copy)]
    enum Step {
        Empty,
        Hiccup,
        Lost,
        Samples(usize),
    }

    /// Source replaying a script of reads at the target rate
    struct ScriptedSource(Vec<Step>);

    struct ScriptedStream(VecDeque<Step>);

    impl AudioSource for ScriptedSource {
        fn open(&self, _format: CaptureFormat) -> Result<Box<dyn PcmStream>, CaptureError> {
            Ok(Box::new(ScriptedStream(self.0.iter().copied().collect())))
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
            match self.0.pop_front().unwrap_or(Step::Empty) {
                Step::Empty => {
                    thread::sleep(StdDuration::from_millis(2));
                    Ok(0)
                }
                Step::Hiccup => Err(CaptureError::StreamFailed("buffer overrun".into())),
                Step::Lost => Err(CaptureError::Unavailable("device unplugged".into())),
                Step::Samples(n) => {
                    let n = n.min(buf.len());
                    buf[..n].fill(1000);
                    Ok(n)
                }
            }
        }
    }

    /// Encoder collecting samples in memory
    #[derive(Default)]
    struct MemoryEncoder {
        samples: Arc<Mutex<Vec<i16>>>,
    }

    struct MemorySink(Arc<Mutex<Vec<i16>>>);

    impl AudioEncoder for MemoryEncoder {
        fn open(
            &self,
            _destination: &Destination,
            _params: &EncodingParams,
        ) -> Result<Box<dyn EncoderSink>, EncoderError> {
            Ok(Box::new(MemorySink(Arc::clone(&self.samples))))
        }
    }

    impl EncoderSink for MemorySink {
        fn write(&mut self, samples: &[i16]) -> Result<(), EncoderError> {
            self.0.lock().unwrap().extend_from_slice(samples);
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<u64, EncoderError> {
            Ok(self.0.lock().unwrap().len() as u64 * 2)
        }
    }

    fn record(script: Vec<Step>) -> (Result<FinalizedRecording, RecorderError>, Vec<i16>) {
        let encoder = Arc::new(MemoryEncoder::default());
        let samples = Arc::clone(&encoder.samples);
        let recorder = PipelineRecorder::new(Arc::new(ScriptedSource(script)), encoder);
        let destination = Destination::from_path("/tmp/scripted.wav").unwrap();

        let handle = recorder
            .begin(&destination, &EncodingParams::standard())
            .unwrap();
        thread::sleep(StdDuration::from_millis(100));
        let result = handle.finalize();
        let written = samples.lock().unwrap().clone();
        (result, written)
    }

    #[test]
    fn stream_hiccups_are_skipped() {
        let (result, written) = record(vec![
            Step::Samples(441),
            Step::Empty,
            Step::Hiccup,
            Step::Samples(441),
            Step::Hiccup,
            Step::Samples(882),
        ]);

        let finalized = result.unwrap();
        assert_eq!(written.len(), 1764);
        assert!(written.iter().all(|&s| s == 1000));
        assert_eq!(finalized.bytes, 3528);
        assert!(finalized.captured.abs_diff(StdDuration::from_millis(40)) < StdDuration::from_millis(1));
    }

    #[test]
    fn lost_device_ends_capture_with_error() {
        let (result, written) = record(vec![Step::Samples(441), Step::Lost, Step::Samples(441)]);

        assert!(matches!(result, Err(RecorderError::Capture(_))));
        assert_eq!(written.len(), 441);
    }

    #[test]
    fn pause_on_ended_capture_fails() {
        let recorder = PipelineRecorder::new(
            Arc::new(ScriptedSource(vec![Step::Lost])),
            Arc::new(MemoryEncoder::default()),
        );
        let destination = Destination::from_path("/tmp/scripted.wav").unwrap();
        let mut handle = recorder
            .begin(&destination, &EncodingParams::standard())
            .unwrap();
        thread::sleep(StdDuration::from_millis(50));

        assert!(handle.pause().is_err());
        assert!(handle.finalize().is_err());
    }
}
