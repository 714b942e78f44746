//! Bounded sample queue between a capture callback and a blocking reader

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::application::ports::CaptureError;

struct RingState {
    samples: VecDeque<i16>,
    capacity: usize,
    dropped: u64,
    failure: Option<String>,
}

/// Drop-oldest ring of mono samples shared by a producer and one reader.
///
/// Producers never block. When the reader falls behind, the oldest samples
/// are discarded so that a read always sees the most recent audio.
#[derive(Clone)]
pub struct SampleRing {
    inner: Arc<(Mutex<RingState>, Condvar)>,
}

impl SampleRing {
    /// Create a ring holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new((
                Mutex::new(RingState {
                    samples: VecDeque::with_capacity(capacity),
                    capacity,
                    dropped: 0,
                    failure: None,
                }),
                Condvar::new(),
            )),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RingState> {
        // A panicking producer must not take the reader down with it
        self.inner.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append samples, evicting the oldest when full
    pub fn push(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }
        let mut state = self.lock();
        let capacity = state.capacity;
        let incoming = if samples.len() > capacity {
            state.dropped += (samples.len() - capacity) as u64;
            &samples[samples.len() - capacity..]
        } else {
            samples
        };
        let overflow = (state.samples.len() + incoming.len()).saturating_sub(capacity);
        if overflow > 0 {
            state.samples.drain(..overflow);
            state.dropped += overflow as u64;
        }
        state.samples.extend(incoming.iter().copied());
        drop(state);
        self.inner.1.notify_one();
    }

    /// Record a stream failure; the next read reports it
    pub fn fail(&self, message: impl Into<String>) {
        let mut state = self.lock();
        state.failure = Some(message.into());
        drop(state);
        self.inner.1.notify_one();
    }

    /// Move up to `buf.len()` samples into `buf`, waiting at most `timeout`
    /// for the first one to arrive.
    pub fn read(&self, buf: &mut [i16], timeout: Duration) -> Result<usize, CaptureError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if let Some(message) = state.failure.take() {
                return Err(CaptureError::StreamFailed(message));
            }
            if !state.samples.is_empty() {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(0);
            }
            state = self
                .inner
                .1
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }

        let n = buf.len().min(state.samples.len());
        for (slot, sample) in buf.iter_mut().zip(state.samples.drain(..n)) {
            *slot = sample;
        }
        Ok(n)
    }

    /// Samples waiting to be read
    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    /// Whether no samples are waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples evicted because the reader fell behind
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}
