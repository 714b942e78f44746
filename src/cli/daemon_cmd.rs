//! Client commands for a running daemon: `send` and `watch`

use tokio::sync::mpsc;

use crate::application::{Command, Event, Reply};
use crate::domain::amplitude::Amplitude;

use super::ipc::{create_ipc_client, encode_line, IpcClient};
use super::presenter::Presenter;
use super::signals::{ControlSignal, SignalHandler};

/// Events buffered between the socket reader and the terminal
const WATCH_BUFFER: usize = 16;

fn connected_client() -> Result<Box<dyn IpcClient>, String> {
    let client = create_ipc_client();
    if !client.is_daemon_running() {
        return Err("No daemon running. Start with: micpulse daemon".to_string());
    }
    Ok(client)
}

/// Send one command and print the reply line to stdout.
///
/// An error reply is printed too and then returned as `Err`.
pub async fn handle_send(command: Command, presenter: &Presenter) -> Result<(), String> {
    let client = connected_client()?;
    let reply = client
        .send_command(&command)
        .await
        .map_err(|e| format!("Failed to communicate with daemon: {}", e))?;

    let line = encode_line(&reply).map_err(|e| e.to_string())?;
    presenter.output_inline(&line);

    match reply {
        Reply::Ok(_) => Ok(()),
        Reply::Error(err) => Err(err.to_string()),
    }
}

/// Draw the daemon's amplitude events until Ctrl+C or the daemon goes away
pub async fn handle_watch(presenter: &mut Presenter) -> Result<(), String> {
    let client = connected_client()?;
    let mut signals =
        SignalHandler::new(false).map_err(|e| format!("Failed to setup signal handler: {}", e))?;

    let (tx, mut events) = mpsc::channel::<Event>(WATCH_BUFFER);
    let reader = tokio::spawn(async move { client.subscribe(tx).await });

    presenter.start_spinner("Waiting for amplitude events (send startVisualizer to begin)");
    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(ControlSignal::TogglePause) => {}
                Some(ControlSignal::Shutdown) | None => break,
            },
            event = events.recv() => match event {
                Some(Event::OnAmplitude { value }) => {
                    presenter.update_spinner(&presenter.format_level(Amplitude::new(value)));
                }
                None => {
                    presenter.stop_spinner();
                    reader.abort();
                    return match reader.await {
                        Ok(Err(e)) => Err(format!("Lost connection to daemon: {}", e)),
                        _ => {
                            presenter.info("Daemon closed the event stream");
                            Ok(())
                        }
                    };
                }
            },
        }
    }

    reader.abort();
    presenter.stop_spinner();
    Ok(())
}
