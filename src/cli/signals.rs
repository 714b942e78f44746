//! OS signal handling for the record, meter and daemon runners

use colored::Colorize;
use tokio::sync::mpsc;

/// Signals the runners react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Toggle pause on the live recording (SIGUSR1)
    TogglePause,
    /// Finish and exit (SIGINT/SIGTERM)
    Shutdown,
}

/// Signal handler
///
/// Forwards OS signals into a channel so runner loops can `select!` on
/// them next to their own work.
pub struct SignalHandler {
    receiver: mpsc::Receiver<ControlSignal>,
}

impl SignalHandler {
    /// Start listening for shutdown and pause-toggle signals.
    ///
    /// `announce` prints a line to stderr for every received signal.
    #[cfg(unix)]
    pub fn new(announce: bool) -> Result<Self, std::io::Error> {
        use tokio::signal::unix::{signal, SignalKind};

        let (tx, rx) = mpsc::channel(10);
        let sources = [
            (SignalKind::interrupt(), "SIGINT", ControlSignal::Shutdown),
            (SignalKind::terminate(), "SIGTERM", ControlSignal::Shutdown),
            (
                SignalKind::user_defined1(),
                "SIGUSR1",
                ControlSignal::TogglePause,
            ),
        ];

        for (kind, name, mapped) in sources {
            let mut stream = signal(kind)?;
            let tx = tx.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    if announce {
                        eprintln!("{} Received {}", "↓".cyan(), name);
                    }
                    if tx.send(mapped).await.is_err() {
                        break;
                    }
                }
            });
        }

        Ok(Self { receiver: rx })
    }

    /// Start listening for Ctrl+C
    #[cfg(not(unix))]
    pub fn new(announce: bool) -> Result<Self, std::io::Error> {
        let (tx, rx) = mpsc::channel(10);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if announce {
                    eprintln!("{} Received Ctrl+C", "↓".cyan());
                }
                if tx.send(ControlSignal::Shutdown).await.is_err() {
                    break;
                }
            }
        });
        Ok(Self { receiver: rx })
    }

    /// Wait for the next signal
    pub async fn recv(&mut self) -> Option<ControlSignal> {
        self.receiver.recv().await
    }
}
