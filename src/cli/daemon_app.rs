//! Daemon app runner

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::block_in_place;
use tracing::info;

use crate::application::ports::{AudioSource, Recorder};
use crate::application::{AudioController, Command, CommandResponse, Reply};
use crate::domain::amplitude::Amplitude;
use crate::domain::config::AppConfig;

use super::app::{build_controller, toggle_pause, EXIT_ERROR, EXIT_SUCCESS};
use super::ipc::{create_ipc_server, Request};
use super::pid_file::{PidFile, PidFileError};
use super::presenter::Presenter;
use super::signals::{ControlSignal, SignalHandler};

/// Amplitude events buffered per subscriber before it starts lagging
const EVENT_BUFFER: usize = 64;

/// Commands queued between connections and the daemon loop
const REQUEST_BUFFER: usize = 16;

/// Run daemon mode
pub async fn run_daemon(config: AppConfig) -> ExitCode {
    let presenter = Presenter::new();

    let pid_file = PidFile::new();
    if let Err(e) = pid_file.acquire() {
        match e {
            PidFileError::AlreadyRunning(pid) => {
                presenter.error(&format!("Another daemon is already running (PID: {})", pid));
            }
            _ => {
                presenter.error(&e.to_string());
            }
        }
        return ExitCode::from(EXIT_ERROR);
    }

    let mut signals = match SignalHandler::new(true) {
        Ok(s) => s,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let (events, _) = broadcast::channel::<Amplitude>(EVENT_BUFFER);
    let mut controller = build_controller(&config, Arc::new(events.clone()));

    let mut server = create_ipc_server();
    if let Err(e) = server.bind() {
        presenter.error(&format!("Failed to bind socket: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }
    let socket = server.path();

    let (requests_tx, mut requests) = mpsc::channel::<Request>(REQUEST_BUFFER);
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(requests_tx, events).await {
            tracing::error!("Socket server stopped: {}", e);
        }
    });

    presenter.daemon_status("Started, waiting for commands...");
    presenter.info(&format!(
        "PID: {} | Socket: {} | SIGUSR1: pause/resume | SIGINT: exit",
        std::process::id(),
        socket
    ));

    let clean = daemon_loop(&mut controller, &mut signals, &mut requests, &presenter).await;

    presenter.daemon_status("Shutting down...");
    if let Some(path) = block_in_place(|| controller.shutdown()) {
        presenter.success(&format!("Finalized {}", path));
    }

    // Dropping the server removes the socket file
    server_task.abort();
    let _ = server_task.await;
    let _ = pid_file.release();

    if clean {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}

/// Serve commands and signals until shutdown. Returns false when a channel
/// closed underneath the loop.
async fn daemon_loop<R, S>(
    controller: &mut AudioController<R, S>,
    signals: &mut SignalHandler,
    requests: &mut mpsc::Receiver<Request>,
    presenter: &Presenter,
) -> bool
where
    R: Recorder,
    S: AudioSource + ?Sized + 'static,
{
    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(ControlSignal::TogglePause) => {
                    match block_in_place(|| toggle_pause(controller)) {
                        Some(Ok(_)) => {
                            presenter.daemon_status(controller.session().state().as_str());
                        }
                        Some(Err(e)) => presenter.error(&e.to_string()),
                        None => presenter.warn("Not recording, nothing to pause"),
                    }
                }
                Some(ControlSignal::Shutdown) => return true,
                None => return false,
            },
            request = requests.recv() => match request {
                Some(request) => {
                    let reply = serve(controller, request.command, presenter);
                    // The client may have hung up already
                    let _ = request.reply.send(reply);
                }
                None => return false,
            },
        }
    }
}

/// Run one command on the controller and report it
fn serve<R, S>(
    controller: &mut AudioController<R, S>,
    command: Command,
    presenter: &Presenter,
) -> Reply
where
    R: Recorder,
    S: AudioSource + ?Sized + 'static,
{
    let method = command.method();
    let result = block_in_place(|| controller.handle(command));
    match &result {
        Ok(CommandResponse::Path {
            local_path: Some(path),
        }) => info!(method, path = %path, "Command handled"),
        Ok(_) => info!(method, "Command handled"),
        Err(e) => presenter.warn(&format!("{} failed: {}", method, e)),
    }
    if method != "status" && result.is_ok() {
        presenter.daemon_status(controller.session().state().as_str());
    }
    result.into()
}
