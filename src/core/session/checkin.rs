//! Check-in orchestration: `idle → recording → finished`.
//!
//! The orchestrator owns the aggregation store, the adapters and the
//! countdown. Everything that mutates it arrives through [`CheckinOrchestrator::run`],
//! which multiplexes browser commands, adapter events and countdown ticks on
//! one task.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use super::adapters::{AdapterFactory, AdapterSet, ConnectOutcome};
use super::error::{SessionError, SessionResult};
use super::events::{SessionCommand, SessionEvent};
use super::overlay::OverlayState;
use super::submission::{CheckinSink, CheckinSubmission};
use super::SessionOptions;
use crate::core::aggregation::AggregationStore;
use crate::core::emotion::EmotionSource;
use crate::core::ingress::{
    AdapterStatus, CaptureInput, FailureKind, IngressEvent, TranscriptRole,
};

/// Capacity of the adapter → session channel.
pub const INGRESS_CHANNEL_CAPACITY: usize = 256;

/// How long a terminal event may wait for room in the browser channel.
pub const TERMINAL_EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckinPhase {
    Idle,
    Recording,
    Finished,
}

impl fmt::Display for CheckinPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckinPhase::Idle => write!(f, "idle"),
            CheckinPhase::Recording => write!(f, "recording"),
            CheckinPhase::Finished => write!(f, "finished"),
        }
    }
}

pub struct CheckinOrchestrator {
    options: SessionOptions,
    sink: Arc<dyn CheckinSink>,
    events: mpsc::Sender<SessionEvent>,
    phase: CheckinPhase,
    store: AggregationStore,
    overlay: OverlayState,
    adapters: AdapterSet,
    ingress_rx: mpsc::Receiver<IngressEvent>,
    countdown: Option<Interval>,
    remaining: Duration,
    patient_id: Option<String>,
    transcript: Vec<String>,
    submitted: bool,
    shut_down: bool,
}

impl CheckinOrchestrator {
    pub fn new(
        options: SessionOptions,
        factory: Arc<dyn AdapterFactory>,
        sink: Arc<dyn CheckinSink>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self::with_store(options, factory, sink, events, AggregationStore::new())
    }

    pub fn with_store(
        options: SessionOptions,
        factory: Arc<dyn AdapterFactory>,
        sink: Arc<dyn CheckinSink>,
        events: mpsc::Sender<SessionEvent>,
        store: AggregationStore,
    ) -> Self {
        let (ingress_tx, ingress_rx) = mpsc::channel(INGRESS_CHANNEL_CAPACITY);
        let overlay = OverlayState::new(options.stability, options.levels);
        Self {
            remaining: options.duration,
            options,
            sink,
            events,
            phase: CheckinPhase::Idle,
            store,
            overlay,
            adapters: AdapterSet::new(factory, ingress_tx),
            ingress_rx,
            countdown: None,
            patient_id: None,
            transcript: Vec::new(),
            submitted: false,
            shut_down: false,
        }
    }

    pub fn phase(&self) -> CheckinPhase {
        self.phase
    }

    pub fn store(&self) -> &AggregationStore {
        &self.store
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Drive the session until the command channel closes or a shutdown is
    /// requested. Adapters are always disposed before this returns.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = self.ingress_rx.recv() => self.handle_ingress(event).await,
                _ = next_tick(&mut self.countdown) => self.on_tick().await,
            }
        }
        self.shutdown().await;
    }

    pub async fn handle_command(&mut self, command: SessionCommand) {
        let result = match command {
            SessionCommand::Start {
                patient_id,
                duration_secs,
            } => {
                self.start(patient_id, duration_secs.map(Duration::from_secs))
                    .await
            }
            SessionCommand::Stop => self.finish().await,
            SessionCommand::Capture(input) => {
                self.capture(&input);
                Ok(())
            }
            SessionCommand::Shutdown => {
                self.shutdown().await;
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("Check-in command rejected: {e}");
            self.emit(SessionEvent::error(e.to_string()));
        }
    }

    /// Begin recording. Only valid from `idle`.
    pub async fn start(
        &mut self,
        patient_id: Option<String>,
        duration: Option<Duration>,
    ) -> SessionResult<()> {
        if self.phase != CheckinPhase::Idle {
            return Err(SessionError::InvalidPhase {
                action: "start",
                phase: self.phase,
            });
        }
        let duration = duration.unwrap_or(self.options.duration);
        if duration.is_zero() {
            return Err(SessionError::InvalidDuration);
        }

        info!(
            "Starting check-in for {} ({}s)",
            patient_id.as_deref().unwrap_or("anonymous"),
            duration.as_secs()
        );

        self.patient_id = patient_id;
        self.transcript.clear();
        self.remaining = duration;
        self.overlay.reset();
        self.store.start_recording();
        self.phase = CheckinPhase::Recording;
        self.emit(SessionEvent::Phase { phase: self.phase });

        for source in [EmotionSource::Facial, EmotionSource::Vocal] {
            let outcome = self.adapters.connect(source).await;
            self.report_connect(source, outcome);
        }

        let tick = self.options.tick.max(Duration::from_millis(1));
        let mut countdown = interval_at(Instant::now() + tick, tick);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.countdown = Some(countdown);
        self.emit(SessionEvent::Countdown {
            remaining_secs: self.remaining.as_secs(),
        });
        Ok(())
    }

    /// Stop recording, publish the summary and submit the check-in once.
    /// Only valid while recording.
    pub async fn finish(&mut self) -> SessionResult<()> {
        if self.phase != CheckinPhase::Recording {
            return Err(SessionError::InvalidPhase {
                action: "finish",
                phase: self.phase,
            });
        }

        self.countdown = None;
        self.adapters.dispose_all().await;

        // Readings and final transcript lines produced before teardown
        // still belong to this check-in.
        while let Ok(event) = self.ingress_rx.try_recv() {
            match event {
                IngressEvent::Reading {
                    reading,
                    face_predictions,
                } => {
                    self.store.add_reading(reading, face_predictions);
                }
                IngressEvent::Transcript {
                    role,
                    text,
                    interim,
                } => self.record_transcript(role, &text, interim),
                _ => {}
            }
        }

        self.store.stop_recording();
        self.phase = CheckinPhase::Finished;
        deliver(&self.events, SessionEvent::Phase { phase: self.phase }).await;

        let summary = self.store.get_data_summary();
        info!(
            "Check-in finished: {} points over {}ms",
            summary.total_points, summary.duration
        );
        let data_points = self.store.get_aggregated_data().to_vec();
        deliver(
            &self.events,
            SessionEvent::Summary {
                summary,
                data_points,
            },
        )
        .await;

        self.submit().await;
        Ok(())
    }

    /// Dispose adapters and finish a running recording. Idempotent.
    pub async fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if self.phase == CheckinPhase::Recording {
            if let Err(e) = self.finish().await {
                error!("Failed to finish check-in during shutdown: {e}");
            }
        } else {
            self.countdown = None;
            self.adapters.dispose_all().await;
        }
        debug!("Check-in session shut down");
    }

    fn capture(&mut self, input: &CaptureInput) {
        if self.phase == CheckinPhase::Recording {
            self.adapters.accept(input);
        }
    }

    pub async fn handle_ingress(&mut self, event: IngressEvent) {
        match event {
            IngressEvent::Reading {
                reading,
                face_predictions,
            } => {
                if self.phase != CheckinPhase::Recording {
                    return;
                }
                let overlay = self.overlay.render(&reading);
                self.store.add_reading(reading, face_predictions);
                self.emit(overlay.into());
            }
            IngressEvent::Cleared { source } => {
                self.emit(SessionEvent::Cleared { source });
            }
            IngressEvent::Status { source, status } => {
                self.emit(SessionEvent::AdapterStatus { source, status });
            }
            IngressEvent::Failed {
                source,
                kind,
                message,
            } => {
                if kind == FailureKind::Authentication && self.phase == CheckinPhase::Recording {
                    let outcome = self.adapters.use_demo(source, message).await;
                    self.report_connect(source, outcome);
                } else {
                    warn!("{source} channel failed ({kind:?}): {message}");
                    self.emit(SessionEvent::AdapterStatus {
                        source,
                        status: AdapterStatus::Error,
                    });
                    self.emit(SessionEvent::error(format!("{source} channel: {message}")));
                }
            }
            IngressEvent::Transcript {
                role,
                text,
                interim,
            } => {
                self.record_transcript(role, &text, interim);
                self.emit(SessionEvent::Transcript {
                    role,
                    text,
                    interim,
                });
            }
            IngressEvent::AssistantAudio { data } => {
                self.emit(SessionEvent::AssistantAudio {
                    data: BASE64.encode(&data),
                });
            }
        }
    }

    /// Keep final, non-empty lines for the submitted transcript.
    fn record_transcript(&mut self, role: TranscriptRole, text: &str, interim: bool) {
        if interim || text.trim().is_empty() {
            return;
        }
        let speaker = match role {
            TranscriptRole::User => "Patient",
            TranscriptRole::Assistant => "Assistant",
        };
        self.transcript.push(format!("{speaker}: {text}"));
    }

    async fn on_tick(&mut self) {
        if self.phase != CheckinPhase::Recording {
            self.countdown = None;
            return;
        }
        self.remaining = self.remaining.saturating_sub(self.options.tick);
        self.emit(SessionEvent::Countdown {
            remaining_secs: self.remaining.as_secs(),
        });
        if self.remaining.is_zero() {
            info!("Check-in countdown elapsed");
            if let Err(e) = self.finish().await {
                error!("Failed to finish check-in on countdown: {e}");
            }
        }
    }

    async fn submit(&mut self) {
        if self.submitted {
            return;
        }
        self.submitted = true;

        let transcript = (!self.transcript.is_empty()).then(|| self.transcript.join("\n"));
        let submission =
            CheckinSubmission::new(self.patient_id.clone(), transcript, self.store.timeline());

        match self.sink.submit(&submission).await {
            Ok(id) => {
                info!("Check-in submitted as {id}");
                deliver(&self.events, SessionEvent::Submitted { id }).await;
            }
            Err(e) => {
                error!("Check-in submission failed: {e}");
                deliver(
                    &self.events,
                    SessionEvent::SubmissionFailed {
                        error: e.to_string(),
                    },
                )
                .await;
            }
        }
    }

    fn report_connect(&mut self, source: EmotionSource, outcome: ConnectOutcome) {
        match outcome {
            ConnectOutcome::Live => {}
            ConnectOutcome::Demo(reason) => {
                self.emit(SessionEvent::DemoMode { source, reason });
            }
            ConnectOutcome::Unavailable(reason) => {
                self.emit(SessionEvent::AdapterStatus {
                    source,
                    status: AdapterStatus::Error,
                });
                self.emit(SessionEvent::error(format!("{source} channel unavailable: {reason}")));
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Session event channel full, dropping {:?}", std::mem::discriminant(&event));
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Send an event that must not be dropped when the browser lags behind.
pub(crate) async fn deliver(events: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    match tokio::time::timeout(TERMINAL_EVENT_TIMEOUT, events.send(event)).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => debug!("Session event receiver closed"),
        Err(_) => warn!(
            "Session event channel stayed full for {}s",
            TERMINAL_EVENT_TIMEOUT.as_secs()
        ),
    }
}

/// Resolve on the next countdown tick, or never when no countdown runs.
pub(crate) async fn next_tick(countdown: &mut Option<Interval>) {
    match countdown {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
