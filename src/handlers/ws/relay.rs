//! Shared browser relay loop for the check-in and call sockets.

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::core::ingress::CaptureInput;
use crate::core::session::{CallCommand, SessionCommand, SessionEvent};

use super::messages::{CallClientMessage, CheckinClientMessage};

/// Session commands queued between the socket and the session loop
pub const COMMAND_BUFFER_SIZE: usize = 64;

/// Events queued towards the browser
pub const EVENT_BUFFER_SIZE: usize = 512;

/// Maximum WebSocket frame size (8 MB)
pub const MAX_WS_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Maximum WebSocket message size (8 MB)
pub const MAX_WS_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

/// Close the socket after this long without client traffic
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// A client message type together with the session command set it feeds.
pub trait RelayProtocol: DeserializeOwned + Send {
    type Command: Send + 'static;
    type Error: Display + Send;

    fn validate(&self) -> Result<(), Self::Error>;
    fn into_command(self) -> Self::Command;
    fn audio(data: Bytes) -> Self::Command;
    fn shutdown() -> Self::Command;
}

impl RelayProtocol for CheckinClientMessage {
    type Command = SessionCommand;
    type Error = super::messages::RelayValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        CheckinClientMessage::validate(self)
    }

    fn into_command(self) -> SessionCommand {
        CheckinClientMessage::into_command(self)
    }

    fn audio(data: Bytes) -> SessionCommand {
        SessionCommand::Capture(CaptureInput::Audio(data))
    }

    fn shutdown() -> SessionCommand {
        SessionCommand::Shutdown
    }
}

impl RelayProtocol for CallClientMessage {
    type Command = CallCommand;
    type Error = super::messages::RelayValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        CallClientMessage::validate(self)
    }

    fn into_command(self) -> CallCommand {
        CallClientMessage::into_command(self)
    }

    fn audio(data: Bytes) -> CallCommand {
        CallCommand::Capture(CaptureInput::Audio(data))
    }

    fn shutdown() -> CallCommand {
        CallCommand::Shutdown
    }
}

/// Pump a browser socket into a session loop until either side goes away.
///
/// `start` receives the command receiver and the event sender and returns
/// the session future, which is spawned. Once the socket closes the session
/// gets a shutdown command and is awaited so a recording in progress is
/// finished before the relay returns.
pub async fn run_relay<P, F, Fut>(socket: WebSocket, label: &'static str, start: F)
where
    P: RelayProtocol,
    F: FnOnce(mpsc::Receiver<P::Command>, mpsc::Sender<SessionEvent>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    info!("{label} relay connected");

    let (mut sender, mut receiver) = socket.split();
    let (command_tx, command_rx) = mpsc::channel::<P::Command>(COMMAND_BUFFER_SIZE);
    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(EVENT_BUFFER_SIZE);

    let session: JoinHandle<()> = tokio::spawn(start(command_rx, event_tx.clone()));

    // Sender task for outgoing events
    let sender_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize session event: {e}");
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(text.into())).await {
                debug!("Relay socket closed while sending: {e}");
                break;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let mut last_activity = Instant::now();
    loop {
        let idle_deadline = last_activity + IDLE_TIMEOUT;
        tokio::select! {
            msg = receiver.next() => {
                last_activity = Instant::now();
                match msg {
                    Some(Ok(msg)) => {
                        if !process_message::<P>(msg, &command_tx, &event_tx).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("{label} relay socket error: {e}");
                        break;
                    }
                    None => {
                        info!("{label} relay closed by client");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep_until(idle_deadline) => {
                warn!("{label} relay idle for {}s, closing", IDLE_TIMEOUT.as_secs());
                let _ = event_tx.try_send(SessionEvent::error("Connection closed due to inactivity"));
                break;
            }
        }
    }

    let _ = command_tx.send(P::shutdown()).await;
    drop(command_tx);
    drop(event_tx);
    if let Err(e) = session.await {
        error!("{label} session task failed: {e}");
    }
    // The session has dropped its event sender, so this drains and exits
    if tokio::time::timeout(Duration::from_secs(5), sender_task)
        .await
        .is_err()
    {
        debug!("{label} relay sender did not drain in time");
    }

    info!("{label} relay terminated");
}

/// Handle one client frame. Returns `false` when the relay should stop.
async fn process_message<P: RelayProtocol>(
    msg: Message,
    commands: &mpsc::Sender<P::Command>,
    events: &mpsc::Sender<SessionEvent>,
) -> bool {
    let command = match msg {
        Message::Text(text) => {
            let parsed: P = match serde_json::from_str(&text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Failed to parse relay message: {e}");
                    let _ = events
                        .send(SessionEvent::error(format!("Invalid message format: {e}")))
                        .await;
                    return true;
                }
            };
            if let Err(e) = parsed.validate() {
                warn!("Relay message validation failed: {e}");
                let _ = events.send(SessionEvent::error(e.to_string())).await;
                return true;
            }
            parsed.into_command()
        }
        Message::Binary(data) => {
            debug!("Received binary audio: {} bytes", data.len());
            P::audio(data)
        }
        Message::Ping(_) | Message::Pong(_) => return true,
        Message::Close(_) => return false,
    };

    // The session loop owns the receiver; a send error means it has exited
    commands.send(command).await.is_ok()
}
