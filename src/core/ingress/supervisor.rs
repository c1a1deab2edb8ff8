//! Connection supervision shared by the vendor adapters.
//!
//! Each adapter runs one supervisor task. The task opens the vendor socket
//! through a [`VendorSession`], and on an unexpected close retries under a
//! [`ReconnectPolicy`] until the policy gives up, the vendor reports a hard
//! error, or the task is cancelled.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::base::{
    AdapterStatus, FailureKind, IngressError, IngressEvent, ReconnectPolicy,
};
use crate::core::emotion::EmotionSource;

pub(crate) type VendorSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How one vendor connection ended.
#[derive(Debug)]
pub(crate) enum SessionOutcome {
    /// Socket closed. `delivered` is set when at least one vendor message
    /// arrived before the close.
    Closed { delivered: bool },
    /// Socket could not be opened or failed mid-stream.
    Failed { error: IngressError, delivered: bool },
    /// Not worth retrying (rejected credentials, vendor hard error).
    Fatal(IngressError),
}

/// One vendor connection, opened and driven until it ends.
#[async_trait]
pub(crate) trait VendorSession: Send + 'static {
    async fn run_once(&mut self, sink: &EventSink) -> SessionOutcome;
}

// =============================================================================
// Event sink
// =============================================================================

/// Adapter-side handle for reporting events and status.
///
/// Emission stops as soon as the adapter is cancelled, so nothing reaches
/// the session after teardown.
#[derive(Clone)]
pub(crate) struct EventSink {
    source: EmotionSource,
    events: mpsc::Sender<IngressEvent>,
    status: Arc<RwLock<AdapterStatus>>,
    cancel: CancellationToken,
}

impl EventSink {
    pub(crate) fn new(
        source: EmotionSource,
        events: mpsc::Sender<IngressEvent>,
        status: Arc<RwLock<AdapterStatus>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            events,
            status,
            cancel,
        }
    }

    pub(crate) fn source(&self) -> EmotionSource {
        self.source
    }

    pub(crate) async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Deliver an event. Returns `false` once the adapter is cancelled or the
    /// session stopped listening.
    pub(crate) async fn emit(&self, event: IngressEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }

    pub(crate) async fn set_status(&self, status: AdapterStatus) {
        if self.cancel.is_cancelled() {
            return;
        }
        let changed = {
            let mut current = self.status.write();
            let changed = *current != status;
            *current = status;
            changed
        };
        if changed {
            debug!("{} adapter status: {}", self.source, status);
            self.emit(IngressEvent::Status {
                source: self.source,
                status,
            })
            .await;
        }
    }

    pub(crate) async fn fail(&self, kind: FailureKind, message: String) {
        self.set_status(AdapterStatus::Error).await;
        self.emit(IngressEvent::Failed {
            source: self.source,
            kind,
            message,
        })
        .await;
    }
}

// =============================================================================
// Supervisor loop
// =============================================================================

/// Drive `session` until it fails terminally or the sink is cancelled.
pub(crate) async fn supervise<S: VendorSession>(
    mut session: S,
    policy: ReconnectPolicy,
    sink: EventSink,
) {
    let source = sink.source();
    let mut consecutive_failures: u32 = 0;

    loop {
        sink.set_status(AdapterStatus::Connecting).await;

        let outcome = tokio::select! {
            _ = sink.cancelled() => break,
            outcome = session.run_once(&sink) => outcome,
        };

        let (reason, delivered) = match outcome {
            SessionOutcome::Fatal(e) => {
                error!("{source} adapter stopped: {e}");
                sink.fail(e.failure_kind(), e.to_string()).await;
                return;
            }
            SessionOutcome::Closed { delivered } => ("socket closed".to_string(), delivered),
            SessionOutcome::Failed { error, delivered } => (error.to_string(), delivered),
        };

        if delivered {
            consecutive_failures = 0;
        }
        consecutive_failures += 1;

        if !policy.should_retry(consecutive_failures) {
            warn!(
                "{source} adapter giving up after {consecutive_failures} consecutive failures: {reason}"
            );
            sink.fail(
                FailureKind::Connection,
                format!("Connection lost after {consecutive_failures} attempts: {reason}"),
            )
            .await;
            return;
        }

        sink.set_status(AdapterStatus::Disconnected).await;
        let delay = policy.calculate_delay(consecutive_failures);
        info!(
            "{source} adapter reconnecting in {:?} (failure {consecutive_failures}): {reason}",
            delay
        );

        tokio::select! {
            _ = sink.cancelled() => break,
            _ = sleep(delay) => {}
        }
    }

    debug!("{source} adapter supervisor cancelled");
}

// =============================================================================
// Helpers
// =============================================================================

/// Open a vendor WebSocket under `connect_timeout`.
///
/// A 401/403 handshake response is reported as an authentication failure.
pub(crate) async fn open_socket<R>(
    request: R,
    connect_timeout: Duration,
) -> Result<VendorSocket, IngressError>
where
    R: IntoClientRequest + Unpin,
{
    match timeout(connect_timeout, connect_async(request)).await {
        Ok(Ok((socket, response))) => {
            debug!("Vendor socket open (status: {})", response.status());
            Ok(socket)
        }
        Ok(Err(WsError::Http(response))) => {
            let status = response.status();
            if status == http::StatusCode::UNAUTHORIZED || status == http::StatusCode::FORBIDDEN {
                Err(IngressError::AuthenticationFailed(format!(
                    "vendor rejected credentials ({status})"
                )))
            } else {
                Err(IngressError::ConnectionFailed(format!(
                    "handshake rejected ({status})"
                )))
            }
        }
        Ok(Err(e)) => Err(IngressError::ConnectionFailed(format!(
            "WebSocket connection failed: {e}"
        ))),
        Err(_) => Err(IngressError::Timeout(connect_timeout)),
    }
}

/// Classify a handshake error for the supervisor.
pub(crate) fn handshake_outcome(error: IngressError) -> SessionOutcome {
    match error {
        IngressError::AuthenticationFailed(_) => SessionOutcome::Fatal(error),
        other => SessionOutcome::Failed {
            error: other,
            delivered: false,
        },
    }
}

/// A running adapter task and the token that stops it.
pub(crate) struct AdapterTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl AdapterTask {
    pub(crate) fn spawn<S: VendorSession>(
        session: S,
        policy: ReconnectPolicy,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        let handle = tokio::spawn(supervise(session, policy, sink));
        Self { cancel, handle }
    }

    pub(crate) fn from_parts(cancel: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self { cancel, handle }
    }

    /// Cancel the task and wait for it to release its socket.
    pub(crate) async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await
            && e.is_panic()
        {
            error!("Adapter task panicked during shutdown: {e}");
        }
    }
}
