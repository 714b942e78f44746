//! IPC (Inter-Process Communication) module for daemon control
//!
//! Newline-delimited JSON over a Unix domain socket. A connection sends
//! command objects and reads one reply line per command. Sending the bare
//! line `subscribe` switches the connection to a stream of amplitude events.

mod unix_socket;

pub use unix_socket::{SocketPath, UnixSocketClient, UnixSocketServer};

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::application::{Command, CommandError, ErrorKind, Event, Reply};
use crate::domain::amplitude::Amplitude;

/// Line that turns a connection into an event subscription
pub const SUBSCRIBE: &str = "subscribe";

/// One command waiting for the daemon loop
#[derive(Debug)]
pub struct Request {
    pub command: Command,
    pub reply: oneshot::Sender<Reply>,
}

/// Trait for IPC servers that listen for daemon commands
#[async_trait::async_trait]
pub trait IpcServer: Send + Sync {
    /// Bind to the IPC endpoint
    fn bind(&mut self) -> io::Result<()>;

    /// Get the path/name of the IPC endpoint
    fn path(&self) -> String;

    /// Accept and handle connections.
    ///
    /// Commands are forwarded to `requests`; subscribers receive every
    /// level published on `events`.
    async fn run(
        &self,
        requests: mpsc::Sender<Request>,
        events: broadcast::Sender<Amplitude>,
    ) -> io::Result<()>;

    /// Cleanup IPC resources
    fn cleanup(&self);
}

/// Trait for IPC clients that talk to the daemon
#[async_trait::async_trait]
pub trait IpcClient: Send + Sync {
    /// Check if daemon appears to be running (endpoint exists)
    fn is_daemon_running(&self) -> bool;

    /// Send a command and receive its reply
    async fn send_command(&self, command: &Command) -> io::Result<Reply>;

    /// Forward events into `events` until the daemon or the receiver goes away
    async fn subscribe(&self, events: mpsc::Sender<Event>) -> io::Result<()>;
}

/// Create the IPC server
pub fn create_ipc_server() -> Box<dyn IpcServer> {
    Box::new(UnixSocketServer::new(SocketPath::new()))
}

/// Create the IPC client
pub fn create_ipc_client() -> Box<dyn IpcClient> {
    Box::new(UnixSocketClient::new(SocketPath::new()))
}

/// `$XDG_RUNTIME_DIR`, or the temp dir without one
pub fn runtime_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// Parse one request line into a command
pub fn decode_command(line: &str) -> Result<Command, CommandError> {
    serde_json::from_str(line).map_err(|e| {
        CommandError::new(
            ErrorKind::InvalidArgument,
            format!("Malformed command: {}", e),
        )
    })
}

/// Serialize a message as one protocol line
pub fn encode_line<T: Serialize>(message: &T) -> io::Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}
