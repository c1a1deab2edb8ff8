//! Facial expression ingress over Hume's streaming models API.
//!
//! Frames published by the browser land in a [`FrameSlot`]. A fixed-cadence
//! capture timer takes the newest frame and submits it, independent of how
//! fast the vendor answers. The first frame after every (re)connect resets
//! the vendor-side stream window.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::config::FacialConfig;
use super::messages::{FacialUpdate, FrameRequest, HUME_API_KEY_HEADER, interpret_response};
use crate::core::aggregation::now_ms;
use crate::core::emotion::{EmotionSource, TimestampedReading};
use crate::core::ingress::base::{
    AdapterStatus, CaptureInput, IngressAdapter, IngressError, IngressEvent, IngressResult,
};
use crate::core::ingress::capture::FrameSlot;
use crate::core::ingress::supervisor::{
    AdapterTask, EventSink, SessionOutcome, VendorSession, handshake_outcome, open_socket,
};

pub struct FacialAdapter {
    config: FacialConfig,
    frames: FrameSlot,
    status: Arc<RwLock<AdapterStatus>>,
    task: Option<AdapterTask>,
}

impl FacialAdapter {
    pub fn new(config: FacialConfig) -> Self {
        Self {
            config,
            frames: FrameSlot::new(),
            status: Arc::new(RwLock::new(AdapterStatus::Disconnected)),
            task: None,
        }
    }

    /// Handle for publishing camera frames.
    pub fn frames(&self) -> FrameSlot {
        self.frames.clone()
    }
}

#[async_trait]
impl IngressAdapter for FacialAdapter {
    fn source(&self) -> EmotionSource {
        EmotionSource::Facial
    }

    fn status(&self) -> AdapterStatus {
        *self.status.read()
    }

    async fn connect(&mut self, events: mpsc::Sender<IngressEvent>) -> IngressResult<()> {
        if self.task.is_some() {
            return Err(IngressError::AlreadyConnected);
        }
        if self.config.credentials().is_none() {
            return Err(IngressError::AuthenticationFailed(
                "Hume API key not configured".to_string(),
            ));
        }
        self.config
            .validate()
            .map_err(IngressError::InvalidConfiguration)?;

        debug!(
            "Starting facial adapter (capture every {}ms)",
            self.config.capture_interval_ms
        );

        let cancel = CancellationToken::new();
        let sink = EventSink::new(
            EmotionSource::Facial,
            events,
            self.status.clone(),
            cancel.clone(),
        );
        let session = FacialSession {
            config: self.config.clone(),
            frames: self.frames.clone(),
        };
        self.task = Some(AdapterTask::spawn(
            session,
            self.config.reconnect.clone(),
            sink,
            cancel,
        ));
        Ok(())
    }

    fn accept(&mut self, input: &CaptureInput) {
        if let CaptureInput::Frame(frame) = input {
            self.frames.publish(frame.clone());
        }
    }

    async fn dispose(&mut self) {
        if let Some(task) = self.task.take() {
            task.shutdown().await;
            debug!("Facial adapter disposed");
        }
        self.frames.clear();
        let mut status = self.status.write();
        if *status != AdapterStatus::Error {
            *status = AdapterStatus::Disconnected;
        }
    }
}

struct FacialSession {
    config: FacialConfig,
    frames: FrameSlot,
}

#[async_trait]
impl VendorSession for FacialSession {
    async fn run_once(&mut self, sink: &EventSink) -> SessionOutcome {
        let Some(api_key) = self.config.credentials() else {
            return SessionOutcome::Fatal(IngressError::AuthenticationFailed(
                "Hume API key not configured".to_string(),
            ));
        };

        let mut request = match self.config.websocket_url.as_str().into_client_request() {
            Ok(request) => request,
            Err(e) => {
                return SessionOutcome::Fatal(IngressError::InvalidConfiguration(format!(
                    "Invalid facial stream URL: {e}"
                )));
            }
        };
        match http::HeaderValue::from_str(api_key) {
            Ok(value) => {
                request.headers_mut().insert(HUME_API_KEY_HEADER, value);
            }
            Err(_) => {
                return SessionOutcome::Fatal(IngressError::AuthenticationFailed(
                    "Hume API key contains invalid characters".to_string(),
                ));
            }
        }

        debug!("Connecting to Hume face stream: {}", self.config.websocket_url);
        let socket = match open_socket(request, self.config.connection_timeout()).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Facial stream connection failed: {e}");
                return handshake_outcome(e);
            }
        };

        info!("Connected to Hume face stream");
        sink.set_status(AdapterStatus::Connected).await;

        let (mut ws_write, mut ws_read) = socket.split();
        let mut ticker = interval(self.config.capture_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut reset_stream = true;
        let mut delivered = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(frame) = self.frames.take() {
                        let request = FrameRequest::new(frame, self.config.stream_window_ms, reset_stream);
                        match serde_json::to_string(&request) {
                            Ok(json) => {
                                if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                                    return SessionOutcome::Failed {
                                        error: IngressError::WebSocket(e.to_string()),
                                        delivered,
                                    };
                                }
                                reset_stream = false;
                            }
                            Err(e) => error!("Failed to serialize frame request: {e}"),
                        }
                    }
                }

                incoming = ws_read.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            delivered = true;
                            match interpret_response(&text) {
                                Ok(FacialUpdate::Detected { emotions, confidence, faces }) => {
                                    trace!("Face detected with {} emotions", emotions.len());
                                    let reading = TimestampedReading::new(
                                        now_ms(),
                                        emotions,
                                        confidence,
                                        EmotionSource::Facial,
                                    );
                                    sink.emit(IngressEvent::Reading {
                                        reading,
                                        face_predictions: faces,
                                    })
                                    .await;
                                }
                                Ok(FacialUpdate::Cleared { warning }) => {
                                    trace!("No face detected ({})", warning.as_deref().unwrap_or("no predictions"));
                                    sink.emit(IngressEvent::Cleared {
                                        source: EmotionSource::Facial,
                                    })
                                    .await;
                                }
                                Ok(FacialUpdate::VendorError { code, message }) => {
                                    let _ = ws_write.send(Message::Close(None)).await;
                                    return SessionOutcome::Fatal(IngressError::Vendor { code, message });
                                }
                                Err(e) => {
                                    warn!("Dropping malformed facial payload: {e}");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("Face stream closed: {:?}", frame);
                            return SessionOutcome::Closed { delivered };
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return SessionOutcome::Failed {
                                error: IngressError::WebSocket(e.to_string()),
                                delivered,
                            };
                        }
                        None => return SessionOutcome::Closed { delivered },
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_without_key_is_auth_failure() {
        let mut adapter = FacialAdapter::new(FacialConfig::default());
        let (tx, _rx) = mpsc::channel(8);
        let result = adapter.connect(tx).await;
        assert!(matches!(result, Err(IngressError::AuthenticationFailed(_))));
        assert_eq!(adapter.status(), AdapterStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let mut adapter = FacialAdapter::new(FacialConfig::default());
        adapter.dispose().await;
        adapter.dispose().await;
        assert_eq!(adapter.status(), AdapterStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_accept_publishes_latest_frame() {
        let mut adapter = FacialAdapter::new(FacialConfig::new("key"));
        adapter.accept(&CaptureInput::Frame("one".into()));
        adapter.accept(&CaptureInput::Frame("two".into()));
        adapter.accept(&CaptureInput::Audio(bytes::Bytes::from_static(b"ignored")));
        assert_eq!(adapter.frames().take().as_deref(), Some("two"));
    }
}
