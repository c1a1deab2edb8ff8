//! Vocal ingress over Hume EVI.
//!
//! Microphone bytes are buffered into fixed-size chunks. Each full chunk is
//! offered to the socket writer through a one-slot queue; if the writer is
//! still busy with the previous chunk, the new one is dropped rather than
//! queued, so at most one chunk waits for send readiness.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::config::VocalConfig;
use super::messages::{
    AudioInput, AudioSettings, EVIClientMessage, EVIServerMessage, SessionSettings,
    SessionTimeouts, TimeoutSetting, deserialize_server_message, serialize_client_message,
};
use crate::core::aggregation::now_ms;
use crate::core::emotion::{EmotionSource, TimestampedReading};
use crate::core::ingress::base::{
    AdapterStatus, CaptureInput, IngressAdapter, IngressError, IngressEvent, IngressResult,
    TranscriptRole,
};
use crate::core::ingress::capture::AudioChunker;
use crate::core::ingress::supervisor::{
    AdapterTask, EventSink, SessionOutcome, VendorSession, VendorSocket, handshake_outcome,
    open_socket,
};

/// Prosody readings have no per-utterance probability.
const VOCAL_CONFIDENCE: f64 = 1.0;

pub struct VocalAdapter {
    config: VocalConfig,
    chunker: AudioChunker,
    chunk_tx: Option<mpsc::Sender<Bytes>>,
    dropped_chunks: u64,
    status: Arc<RwLock<AdapterStatus>>,
    task: Option<AdapterTask>,
}

impl VocalAdapter {
    pub fn new(config: VocalConfig) -> Self {
        let chunker = AudioChunker::new(config.audio_chunk_bytes);
        Self {
            config,
            chunker,
            chunk_tx: None,
            dropped_chunks: 0,
            status: Arc::new(RwLock::new(AdapterStatus::Disconnected)),
            task: None,
        }
    }

    /// Chunks discarded because the writer was busy.
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks
    }
}

#[async_trait]
impl IngressAdapter for VocalAdapter {
    fn source(&self) -> EmotionSource {
        EmotionSource::Vocal
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

        let (chunk_tx, audio_rx) = mpsc::channel(1);
        self.chunk_tx = Some(chunk_tx);
        self.chunker.reset();

        let cancel = CancellationToken::new();
        let sink = EventSink::new(
            EmotionSource::Vocal,
            events,
            self.status.clone(),
            cancel.clone(),
        );
        let session = VocalSession {
            config: self.config.clone(),
            audio_rx,
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
        let CaptureInput::Audio(data) = input else {
            return;
        };
        let Some(tx) = self.chunk_tx.as_ref() else {
            return;
        };

        for chunk in self.chunker.push(data) {
            match tx.try_send(chunk) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped_chunks += 1;
                    trace!("Vocal writer busy, dropped audio chunk ({} total)", self.dropped_chunks);
                }
                Err(TrySendError::Closed(_)) => return,
            }
        }
    }

    async fn dispose(&mut self) {
        self.chunk_tx = None;
        if let Some(task) = self.task.take() {
            task.shutdown().await;
            debug!(
                "Vocal adapter disposed ({} chunks dropped while busy)",
                self.dropped_chunks
            );
        }
        self.chunker.reset();
        let mut status = self.status.write();
        if *status != AdapterStatus::Error {
            *status = AdapterStatus::Disconnected;
        }
    }
}

struct VocalSession {
    config: VocalConfig,
    audio_rx: mpsc::Receiver<Bytes>,
}

impl VocalSession {
    fn session_settings(&self) -> EVIClientMessage {
        EVIClientMessage::SessionSettings(SessionSettings {
            system_prompt: self.config.system_prompt.clone(),
            voice_id: self.config.voice_id.clone(),
            language: self.config.language.clone(),
            audio: AudioSettings {
                encoding: self.config.input_encoding,
                sample_rate: self.config.sample_rate,
                channels: self.config.channels,
            },
            timeouts: SessionTimeouts {
                inactivity: TimeoutSetting::seconds(self.config.inactivity_timeout_secs),
                max_duration: TimeoutSetting::seconds(self.config.max_duration_secs),
            },
        })
    }

    async fn send(
        ws_write: &mut futures_util::stream::SplitSink<VendorSocket, Message>,
        msg: &EVIClientMessage,
    ) -> Result<(), IngressError> {
        let json = serialize_client_message(msg)?;
        ws_write
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| IngressError::WebSocket(e.to_string()))
    }

    /// Handle one EVI message. Returns an error only for vendor hard errors.
    async fn handle_server_message(text: &str, sink: &EventSink) -> Result<(), IngressError> {
        let msg = match deserialize_server_message(text) {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to deserialize EVI message: {e}");
                return Ok(());
            }
        };

        match msg {
            EVIServerMessage::ChatMetadata(meta) => {
                info!("EVI chat metadata: chat_id={}", meta.chat_id);
            }
            EVIServerMessage::SessionStatus(status) => {
                debug!(
                    "EVI session status: {} {}",
                    status.status.as_deref().unwrap_or("unknown"),
                    status.message.as_deref().unwrap_or_default()
                );
            }
            EVIServerMessage::UserMessage(user_msg) => {
                let interim = user_msg.interim == Some(true);
                match user_msg.prosody() {
                    Some(emotions) if !emotions.is_empty() => {
                        let reading = TimestampedReading::new(
                            now_ms(),
                            emotions,
                            VOCAL_CONFIDENCE,
                            EmotionSource::Vocal,
                        );
                        sink.emit(IngressEvent::Reading {
                            reading,
                            face_predictions: Vec::new(),
                        })
                        .await;
                    }
                    _ => {
                        sink.emit(IngressEvent::Cleared {
                            source: EmotionSource::Vocal,
                        })
                        .await;
                    }
                }
                sink.emit(IngressEvent::Transcript {
                    role: TranscriptRole::User,
                    text: user_msg.message.content,
                    interim,
                })
                .await;
            }
            EVIServerMessage::AssistantMessage(assistant_msg) => {
                sink.emit(IngressEvent::Transcript {
                    role: TranscriptRole::Assistant,
                    text: assistant_msg.message.content,
                    interim: false,
                })
                .await;
            }
            EVIServerMessage::AudioOutput(audio) => match audio.decode_audio() {
                Ok(data) => {
                    sink.emit(IngressEvent::AssistantAudio {
                        data: Bytes::from(data),
                    })
                    .await;
                }
                Err(e) => warn!("Dropping undecodable EVI audio output: {e}"),
            },
            EVIServerMessage::AssistantEnd(_) => {
                trace!("EVI assistant turn ended");
            }
            EVIServerMessage::Error(err) => {
                error!("EVI error: {} - {}", err.code.as_deref().unwrap_or("unknown"), err.message);
                return Err(IngressError::Vendor {
                    code: err.code.unwrap_or_else(|| "unknown".to_string()),
                    message: err.message,
                });
            }
            EVIServerMessage::Unknown => {
                trace!("Ignoring unknown EVI message type");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VendorSession for VocalSession {
    async fn run_once(&mut self, sink: &EventSink) -> SessionOutcome {
        let url = self.config.build_websocket_url();
        debug!("Connecting to Hume EVI: {}", url.split('?').next().unwrap_or(&url));

        let socket = match open_socket(url, self.config.connection_timeout()).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("EVI connection failed: {e}");
                return handshake_outcome(e);
            }
        };

        let (mut ws_write, mut ws_read) = socket.split();

        if let Err(e) = Self::send(&mut ws_write, &self.session_settings()).await {
            return SessionOutcome::Failed {
                error: e,
                delivered: false,
            };
        }

        info!("Connected to Hume EVI");
        sink.set_status(AdapterStatus::Connected).await;

        let mut delivered = false;

        loop {
            tokio::select! {
                Some(chunk) = self.audio_rx.recv() => {
                    let msg = EVIClientMessage::AudioInput(AudioInput::from_bytes(&chunk));
                    if let Err(e) = Self::send(&mut ws_write, &msg).await {
                        return SessionOutcome::Failed { error: e, delivered };
                    }
                }

                incoming = ws_read.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            delivered = true;
                            if let Err(e) = Self::handle_server_message(&text, sink).await {
                                let _ = ws_write.send(Message::Close(None)).await;
                                return SessionOutcome::Fatal(e);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("EVI socket closed: {:?}", frame);
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
        let mut adapter = VocalAdapter::new(VocalConfig::default());
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(
            adapter.connect(tx).await,
            Err(IngressError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_busy_writer_drops_chunks() {
        let mut config = VocalConfig::new("key");
        config.audio_chunk_bytes = 4;
        let mut adapter = VocalAdapter::new(config);

        // Wire the one-slot queue without a running writer
        let (tx, mut rx) = mpsc::channel(1);
        adapter.chunk_tx = Some(tx);

        adapter.accept(&CaptureInput::Audio(Bytes::from_static(&[0u8; 12])));
        assert_eq!(adapter.dropped_chunks(), 2);
        assert_eq!(rx.recv().await.map(|c| c.len()), Some(4));

        // Slot is free again
        adapter.accept(&CaptureInput::Audio(Bytes::from_static(&[1u8; 4])));
        assert_eq!(adapter.dropped_chunks(), 2);
        assert_eq!(rx.recv().await.map(|c| c[0]), Some(1));
    }

    #[tokio::test]
    async fn test_frames_are_ignored() {
        let mut adapter = VocalAdapter::new(VocalConfig::new("key"));
        adapter.accept(&CaptureInput::Frame("jpeg".into()));
        assert_eq!(adapter.dropped_chunks(), 0);
        adapter.dispose().await;
        adapter.dispose().await;
        assert_eq!(adapter.status(), AdapterStatus::Disconnected);
    }
}
