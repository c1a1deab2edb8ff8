//! Video-call overlay session: `initial → setup → call → ended`.
//!
//! Only the facial channel runs during a call. Readings are aggregated while
//! the call is connected and the summary is published when it ends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use super::SessionOptions;
use super::adapters::{AdapterFactory, AdapterSet, ConnectOutcome};
use super::checkin::{INGRESS_CHANNEL_CAPACITY, deliver};
use super::error::{SessionError, SessionResult};
use super::events::{CallCommand, SessionEvent};
use super::overlay::OverlayState;
use crate::core::aggregation::{AggregationStore, DataSummary};
use crate::core::emotion::EmotionSource;
use crate::core::ingress::{AdapterStatus, FailureKind, IngressEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallPhase {
    Initial,
    Setup,
    Call,
    Ended,
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallPhase::Initial => write!(f, "initial"),
            CallPhase::Setup => write!(f, "setup"),
            CallPhase::Call => write!(f, "call"),
            CallPhase::Ended => write!(f, "ended"),
        }
    }
}

/// Call phase bookkeeping plus the call's own aggregation store.
#[derive(Debug)]
pub struct CallSession {
    phase: CallPhase,
    room: Option<String>,
    store: AggregationStore,
}

impl Default for CallSession {
    fn default() -> Self {
        Self::new(AggregationStore::new())
    }
}

impl CallSession {
    pub fn new(store: AggregationStore) -> Self {
        Self {
            phase: CallPhase::Initial,
            room: None,
            store,
        }
    }

    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn store(&self) -> &AggregationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AggregationStore {
        &mut self.store
    }

    pub fn begin_setup(&mut self, room: impl Into<String>) -> SessionResult<()> {
        if self.phase != CallPhase::Initial {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                event: "setup",
            });
        }
        self.room = Some(room.into());
        self.phase = CallPhase::Setup;
        Ok(())
    }

    /// The remote party joined; start aggregating.
    pub fn connected(&mut self) -> SessionResult<()> {
        if self.phase != CallPhase::Setup {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                event: "connected",
            });
        }
        self.store.start_recording();
        self.phase = CallPhase::Call;
        Ok(())
    }

    /// Leave the call from any live phase and return the call summary.
    pub fn end(&mut self) -> SessionResult<DataSummary> {
        if self.phase == CallPhase::Ended {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                event: "end",
            });
        }
        self.store.stop_recording();
        self.phase = CallPhase::Ended;
        Ok(self.store.get_data_summary())
    }
}

/// Event loop behind the call relay.
pub struct CallOrchestrator {
    session: CallSession,
    events: mpsc::Sender<SessionEvent>,
    overlay: OverlayState,
    adapters: AdapterSet,
    ingress_rx: mpsc::Receiver<IngressEvent>,
}

impl CallOrchestrator {
    pub fn new(
        options: SessionOptions,
        factory: Arc<dyn AdapterFactory>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let (ingress_tx, ingress_rx) = mpsc::channel(INGRESS_CHANNEL_CAPACITY);
        Self {
            session: CallSession::default(),
            events,
            overlay: OverlayState::new(options.stability, options.levels),
            adapters: AdapterSet::new(factory, ingress_tx),
            ingress_rx,
        }
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<CallCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(CallCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = self.ingress_rx.recv() => self.handle_ingress(event).await,
            }
        }
        if self.session.phase() != CallPhase::Ended {
            self.finish().await;
        } else {
            self.adapters.dispose_all().await;
        }
        debug!("Call session shut down");
    }

    pub async fn handle_command(&mut self, command: CallCommand) {
        let result = match command {
            CallCommand::Setup { room } => self.session.begin_setup(room).map(|()| {
                self.emit_phase();
            }),
            CallCommand::Connected => match self.session.connected() {
                Ok(()) => {
                    self.emit_phase();
                    self.overlay.reset();
                    let outcome = self.adapters.connect(EmotionSource::Facial).await;
                    self.report_connect(outcome);
                    Ok(())
                }
                Err(e) => Err(e),
            },
            CallCommand::End => {
                if self.session.phase() == CallPhase::Ended {
                    Err(SessionError::InvalidTransition {
                        from: CallPhase::Ended,
                        event: "end",
                    })
                } else {
                    self.finish().await;
                    Ok(())
                }
            }
            CallCommand::Capture(input) => {
                if self.session.phase() == CallPhase::Call {
                    self.adapters.accept(&input);
                }
                Ok(())
            }
            CallCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            warn!("Call command rejected: {e}");
            self.emit(SessionEvent::error(e.to_string()));
        }
    }

    pub async fn handle_ingress(&mut self, event: IngressEvent) {
        match event {
            IngressEvent::Reading {
                reading,
                face_predictions,
            } => {
                if self.session.phase() != CallPhase::Call {
                    return;
                }
                let overlay = self.overlay.render(&reading);
                self.session.store_mut().add_reading(reading, face_predictions);
                self.emit(overlay.into());
            }
            IngressEvent::Cleared { source } => self.emit(SessionEvent::Cleared { source }),
            IngressEvent::Status { source, status } => {
                self.emit(SessionEvent::AdapterStatus { source, status })
            }
            IngressEvent::Failed {
                source,
                kind,
                message,
            } => {
                if kind == FailureKind::Authentication && self.session.phase() == CallPhase::Call {
                    let outcome = self.adapters.use_demo(source, message).await;
                    self.report_connect(outcome);
                } else {
                    warn!("{source} channel failed during call: {message}");
                    self.emit(SessionEvent::error(format!("{source} channel: {message}")));
                }
            }
            // The call overlay has no conversational channel.
            IngressEvent::Transcript { .. } | IngressEvent::AssistantAudio { .. } => {}
        }
    }

    async fn finish(&mut self) {
        self.adapters.dispose_all().await;
        match self.session.end() {
            Ok(summary) => {
                info!(
                    "Call in room {} ended with {} points",
                    self.session.room().unwrap_or("-"),
                    summary.total_points
                );
                let phase = SessionEvent::CallPhase {
                    phase: self.session.phase(),
                    room: self.session.room().map(str::to_string),
                };
                deliver(&self.events, phase).await;
                let data_points = self.session.store().get_aggregated_data().to_vec();
                deliver(
                    &self.events,
                    SessionEvent::Summary {
                        summary,
                        data_points,
                    },
                )
                .await;
            }
            Err(e) => warn!("Call already ended: {e}"),
        }
    }

    fn report_connect(&mut self, outcome: ConnectOutcome) {
        let source = EmotionSource::Facial;
        match outcome {
            ConnectOutcome::Live => {}
            ConnectOutcome::Demo(reason) => self.emit(SessionEvent::DemoMode { source, reason }),
            ConnectOutcome::Unavailable(reason) => {
                self.emit(SessionEvent::AdapterStatus {
                    source,
                    status: AdapterStatus::Error,
                });
                self.emit(SessionEvent::error(reason));
            }
        }
    }

    fn emit_phase(&self) {
        self.emit(SessionEvent::CallPhase {
            phase: self.session.phase(),
            room: self.session.room().map(str::to_string),
        });
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(TrySendError::Full(_)) = self.events.try_send(event) {
            warn!("Call event channel full, dropping event");
        }
    }
}
