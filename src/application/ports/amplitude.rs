//! Amplitude delivery port
//!
//! The sampling loop runs on its own worker thread and hands every level to
//! an [`AmplitudeSink`]. Sinks must be cheap: they forward the value to the
//! consumer's own execution context (a channel, a UI event queue) rather than
//! doing work on the worker.

use tokio::sync::{broadcast, mpsc};

use crate::domain::amplitude::Amplitude;

/// Receiver of amplitude emissions
pub trait AmplitudeSink: Send + Sync {
    /// Hand one level to the consumer. Must not block.
    fn deliver(&self, level: Amplitude);
}

impl<F> AmplitudeSink for F
where
    F: Fn(Amplitude) + Send + Sync,
{
    fn deliver(&self, level: Amplitude) {
        self(level)
    }
}

/// Fan-out to every subscriber; lagging subscribers lose the oldest values
impl AmplitudeSink for broadcast::Sender<Amplitude> {
    fn deliver(&self, level: Amplitude) {
        // No subscribers is not an error
        let _ = self.send(level);
    }
}

/// Sending half of a bounded amplitude channel.
///
/// When the consumer falls behind, new values are dropped instead of
/// queued: amplitude is a continuously refreshed signal.
#[derive(Debug, Clone)]
pub struct AmplitudeSender {
    tx: mpsc::Sender<Amplitude>,
}

impl AmplitudeSink for AmplitudeSender {
    fn deliver(&self, level: Amplitude) {
        let _ = self.tx.try_send(level);
    }
}

/// Receiving half of a bounded amplitude channel
#[derive(Debug)]
pub struct AmplitudeReceiver {
    rx: mpsc::Receiver<Amplitude>,
}

impl AmplitudeReceiver {
    /// Wait for the next level; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Amplitude> {
        self.rx.recv().await
    }

    /// Take a level if one is waiting
    pub fn try_recv(&mut self) -> Option<Amplitude> {
        self.rx.try_recv().ok()
    }

    /// Blocking variant for non-async consumers
    pub fn blocking_recv(&mut self) -> Option<Amplitude> {
        self.rx.blocking_recv()
    }
}

/// Create a bounded amplitude channel holding at most `capacity` values
pub fn amplitude_channel(capacity: usize) -> (AmplitudeSender, AmplitudeReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (AmplitudeSender { tx }, AmplitudeReceiver { rx })
}
