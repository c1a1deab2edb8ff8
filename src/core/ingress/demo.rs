//! Synthetic emotion source used when vendor credentials are missing or
//! rejected.
//!
//! Scores follow a bounded random walk over a small set of emotions so the
//! overlay and the timeline behave like they would with live data.

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::base::{AdapterStatus, IngressAdapter, IngressEvent, IngressResult};
use super::supervisor::{AdapterTask, EventSink};
use crate::core::aggregation::now_ms;
use crate::core::emotion::{
    BoundingBox, EmotionSample, EmotionSource, EmotionVector, FacePrediction, TimestampedReading,
};

pub const DEFAULT_DEMO_INTERVAL: Duration = Duration::from_secs(1);

const DEMO_EMOTIONS: [&str; 7] = [
    "Calmness",
    "Joy",
    "Interest",
    "Concentration",
    "Contentment",
    "Tiredness",
    "Anxiety",
];

/// Largest per-tick change of a single score.
const MAX_STEP: f64 = 0.08;

pub struct DemoAdapter {
    source: EmotionSource,
    interval: Duration,
    status: Arc<RwLock<AdapterStatus>>,
    task: Option<AdapterTask>,
}

impl DemoAdapter {
    pub fn new(source: EmotionSource) -> Self {
        Self::with_interval(source, DEFAULT_DEMO_INTERVAL)
    }

    pub fn with_interval(source: EmotionSource, interval: Duration) -> Self {
        Self {
            source,
            interval,
            status: Arc::new(RwLock::new(AdapterStatus::Disconnected)),
            task: None,
        }
    }
}

#[async_trait]
impl IngressAdapter for DemoAdapter {
    fn source(&self) -> EmotionSource {
        self.source
    }

    fn status(&self) -> AdapterStatus {
        *self.status.read()
    }

    fn is_demo(&self) -> bool {
        true
    }

    async fn connect(&mut self, events: mpsc::Sender<IngressEvent>) -> IngressResult<()> {
        if let Some(task) = self.task.take() {
            task.shutdown().await;
        }

        info!("Starting demo {} data every {:?}", self.source, self.interval);

        let cancel = CancellationToken::new();
        let sink = EventSink::new(self.source, events, self.status.clone(), cancel.clone());
        let handle = tokio::spawn(run_demo(sink, self.interval));
        self.task = Some(AdapterTask::from_parts(cancel, handle));
        Ok(())
    }

    async fn dispose(&mut self) {
        if let Some(task) = self.task.take() {
            task.shutdown().await;
        }
        *self.status.write() = AdapterStatus::Disconnected;
    }
}

async fn run_demo(sink: EventSink, period: Duration) {
    let source = sink.source();
    let mut walk = DemoWalk::new(StdRng::from_entropy());
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    sink.set_status(AdapterStatus::Connected).await;

    loop {
        tokio::select! {
            _ = sink.cancelled() => break,
            _ = ticker.tick() => {
                let emotions = walk.step();
                let face_predictions = match source {
                    EmotionSource::Facial => vec![demo_face(&emotions)],
                    EmotionSource::Vocal => Vec::new(),
                };
                let reading = TimestampedReading::new(now_ms(), emotions, 1.0, source);
                if !sink.emit(IngressEvent::Reading { reading, face_predictions }).await {
                    break;
                }
            }
        }
    }

    debug!("Demo {source} source stopped");
}

fn demo_face(emotions: &EmotionVector) -> FacePrediction {
    FacePrediction {
        face_id: Some("demo".to_string()),
        frame: None,
        time: None,
        prob: Some(1.0),
        bounding_box: Some(BoundingBox {
            x: 0.25,
            y: 0.2,
            w: 0.5,
            h: 0.6,
        }),
        emotions: emotions.as_slice().to_vec(),
    }
}

/// Bounded random walk over [`DEMO_EMOTIONS`].
struct DemoWalk<R> {
    rng: R,
    scores: [f64; DEMO_EMOTIONS.len()],
}

impl<R: Rng> DemoWalk<R> {
    fn new(mut rng: R) -> Self {
        let mut scores = [0.0; DEMO_EMOTIONS.len()];
        for score in scores.iter_mut() {
            *score = rng.gen_range(0.05..0.6);
        }
        Self { rng, scores }
    }

    fn step(&mut self) -> EmotionVector {
        for score in self.scores.iter_mut() {
            let delta = self.rng.gen_range(-MAX_STEP..=MAX_STEP);
            *score = (*score + delta).clamp(0.0, 1.0);
        }
        DEMO_EMOTIONS
            .iter()
            .zip(self.scores.iter())
            .map(|(name, score)| EmotionSample::new(*name, *score))
            .collect::<Vec<_>>()
            .into()
    }
}
