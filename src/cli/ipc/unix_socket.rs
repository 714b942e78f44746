//! Unix Domain Socket communication for daemon control

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use super::{
    decode_command, encode_line, runtime_dir, IpcClient, IpcServer, Request, SUBSCRIBE,
};
use crate::application::{Command, CommandError, Event, Reply};
use crate::domain::amplitude::Amplitude;

/// Socket file name inside the runtime directory
const SOCKET_NAME: &str = "micpulse.sock";

/// Socket path resolver
#[derive(Debug, Clone)]
pub struct SocketPath {
    path: PathBuf,
}

impl SocketPath {
    /// Create socket path, preferring XDG_RUNTIME_DIR
    pub fn new() -> Self {
        Self {
            path: runtime_dir().join(SOCKET_NAME),
        }
    }

    /// Socket at an explicit location
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the socket path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if socket file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Remove socket file if it exists
    pub fn cleanup(&self) -> io::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl Default for SocketPath {
    fn default() -> Self {
        Self::new()
    }
}

/// Unix Domain Socket server for daemon commands
pub struct UnixSocketServer {
    socket_path: SocketPath,
    listener: Option<UnixListener>,
}

impl UnixSocketServer {
    /// Create a new socket server
    pub fn new(socket_path: SocketPath) -> Self {
        Self {
            socket_path,
            listener: None,
        }
    }
}

impl Drop for UnixSocketServer {
    fn drop(&mut self) {
        if self.listener.is_some() {
            self.cleanup();
        }
    }
}

#[async_trait]
impl IpcServer for UnixSocketServer {
    fn bind(&mut self) -> io::Result<()> {
        // Remove stale socket file if it exists
        self.socket_path.cleanup()?;

        let listener = UnixListener::bind(self.socket_path.path())?;
        self.listener = Some(listener);
        Ok(())
    }

    fn path(&self) -> String {
        self.socket_path.path().to_string_lossy().to_string()
    }

    async fn run(
        &self,
        requests: mpsc::Sender<Request>,
        events: broadcast::Sender<Amplitude>,
    ) -> io::Result<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Socket not bound"))?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let requests = requests.clone();
                    let events = events.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, requests, events).await {
                            debug!("Socket connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    warn!("Socket accept error: {}", e);
                }
            }
        }
    }

    fn cleanup(&self) {
        let _ = self.socket_path.cleanup();
    }
}

/// Serve one client until it disconnects
async fn handle_connection(
    stream: UnixStream,
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<Amplitude>,
) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == SUBSCRIBE {
            return stream_events(lines, writer, events.subscribe()).await;
        }

        let reply = match decode_command(line) {
            Ok(command) => dispatch(&requests, command).await,
            Err(err) => Reply::Error(err),
        };
        writer.write_all(encode_line(&reply)?.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Hand a command to the daemon loop and wait for its reply
async fn dispatch(requests: &mpsc::Sender<Request>, command: Command) -> Reply {
    let kind = command.failure_kind();
    let (reply_tx, reply_rx) = oneshot::channel();
    let request = Request {
        command,
        reply: reply_tx,
    };
    if requests.send(request).await.is_err() {
        return Reply::Error(CommandError::new(kind, "Daemon is shutting down"));
    }
    reply_rx
        .await
        .unwrap_or_else(|_| Reply::Error(CommandError::new(kind, "Daemon dropped the command")))
}

/// Write every published level until the client hangs up
async fn stream_events(
    mut lines: Lines<BufReader<OwnedReadHalf>>,
    mut writer: OwnedWriteHalf,
    mut levels: broadcast::Receiver<Amplitude>,
) -> io::Result<()> {
    loop {
        tokio::select! {
            received = levels.recv() => match received {
                Ok(level) => {
                    let line = encode_line(&Event::from(level))?;
                    if writer.write_all(line.as_bytes()).await.is_err() {
                        return Ok(());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Subscriber lagging, dropped amplitude events");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            line = lines.next_line() => match line {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => return Ok(()),
            },
        }
    }
}

/// Unix Domain Socket client for sending commands to daemon
pub struct UnixSocketClient {
    socket_path: SocketPath,
}

impl UnixSocketClient {
    /// Create a new socket client
    pub fn new(socket_path: SocketPath) -> Self {
        Self { socket_path }
    }
}

#[async_trait]
impl IpcClient for UnixSocketClient {
    fn is_daemon_running(&self) -> bool {
        self.socket_path.exists()
    }

    async fn send_command(&self, command: &Command) -> io::Result<Reply> {
        let stream = UnixStream::connect(self.socket_path.path()).await?;
        let (reader, mut writer) = stream.into_split();

        writer.write_all(encode_line(command)?.as_bytes()).await?;
        writer.flush().await?;

        let mut reader = BufReader::new(reader);
        let mut response = String::new();
        if reader.read_line(&mut response).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Daemon closed the connection without replying",
            ));
        }

        Ok(serde_json::from_str(response.trim())?)
    }

    async fn subscribe(&self, events: mpsc::Sender<Event>) -> io::Result<()> {
        let stream = UnixStream::connect(self.socket_path.path()).await?;
        let (reader, mut writer) = stream.into_split();

        writer
            .write_all(format!("{}\n", SUBSCRIBE).as_bytes())
            .await?;
        writer.flush().await?;

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let event: Event = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(e) => {
                    debug!("Ignoring unexpected line from daemon: {}", e);
                    continue;
                }
            };
            if events.send(event).await.is_err() {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{CommandResponse, ErrorKind};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn socket_path_uses_runtime_dir() {
        let socket_path = SocketPath::new();
        assert_eq!(socket_path.path(), runtime_dir().join(SOCKET_NAME).as_path());
    }

    /// Bound server plus a loop answering every command with `true`
    async fn start_server(dir: &TempDir) -> (SocketPath, broadcast::Sender<Amplitude>) {
        let socket_path = SocketPath::with_path(dir.path().join("test.sock"));
        let mut server = UnixSocketServer::new(socket_path.clone());
        server.bind().unwrap();

        let (requests_tx, mut requests_rx) = mpsc::channel::<Request>(4);
        let (events, _) = broadcast::channel(16);
        let server_events = events.clone();
        tokio::spawn(async move {
            let _ = server.run(requests_tx, server_events).await;
        });
        tokio::spawn(async move {
            while let Some(request) = requests_rx.recv().await {
                let reply = match request.command {
                    Command::PauseRecording => Reply::Error(CommandError::new(
                        ErrorKind::PauseError,
                        "No active recording to pause",
                    )),
                    _ => Reply::Ok(CommandResponse::Started(true)),
                };
                let _ = request.reply.send(reply);
            }
        });

        (socket_path, events)
    }

    #[tokio::test]
    async fn command_round_trip() {
        let dir = TempDir::new().unwrap();
        let (socket_path, _events) = start_server(&dir).await;
        let client = UnixSocketClient::new(socket_path);

        assert!(client.is_daemon_running());
        let reply = client
            .send_command(&Command::StartRecording { file_path: None })
            .await
            .unwrap();
        assert_eq!(reply, Reply::Ok(CommandResponse::Started(true)));

        let reply = client.send_command(&Command::PauseRecording).await.unwrap();
        match reply {
            Reply::Error(err) => assert_eq!(err.code, ErrorKind::PauseError),
            other => panic!("Expected error reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_line_gets_invalid_argument() {
        let dir = TempDir::new().unwrap();
        let (socket_path, _events) = start_server(&dir).await;

        let stream = UnixStream::connect(socket_path.path()).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"{\"method\":\"rewind\"}\n").await.unwrap();

        let mut lines = BufReader::new(reader).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let reply: Reply = serde_json::from_str(&line).unwrap();
        match reply {
            Reply::Error(err) => assert_eq!(err.code, ErrorKind::InvalidArgument),
            other => panic!("Expected error reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_levels() {
        let dir = TempDir::new().unwrap();
        let (socket_path, events) = start_server(&dir).await;
        let client = UnixSocketClient::new(socket_path);

        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let _ = client.subscribe(tx).await;
        });

        // Publish until the subscription is live on the server side
        let received = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let _ = events.send(Amplitude::new(0.25));
                tokio::select! {
                    event = rx.recv() => break event,
                    _ = tokio::time::sleep(Duration::from_millis(20)) => {}
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(received, Some(Event::OnAmplitude { value: 0.25 }));
    }

    #[tokio::test]
    async fn server_drop_removes_socket_file() {
        let dir = TempDir::new().unwrap();
        let socket_path = SocketPath::with_path(dir.path().join("drop.sock"));
        let mut server = UnixSocketServer::new(socket_path.clone());
        server.bind().unwrap();
        assert!(socket_path.exists());
        drop(server);
        assert!(!socket_path.exists());
    }
}
