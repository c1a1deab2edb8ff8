//! Session-scoped accumulator of emotion readings.
//!
//! One store exists per check-in or call. It is owned by the session loop,
//! which is its only writer, so it carries no synchronization of its own.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::summary::{DataSummary, TOP_EMOTION_LIMIT, rank_top_emotions};
use crate::core::emotion::{
    EmotionSource, EmotionVector, FacePrediction, TimestampedReading,
};

/// A reading as stored during a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedDataPoint {
    /// Elapsed time since recording start, `HH:MM:SS`.
    pub timestamp: String,
    /// Capture time in epoch milliseconds.
    pub recorded_at: i64,
    pub source: EmotionSource,
    pub confidence: f64,
    pub emotions: EmotionVector,
    #[serde(default)]
    pub face_predictions: Vec<FacePrediction>,
}

impl AggregatedDataPoint {
    pub fn to_reading(&self) -> TimestampedReading {
        TimestampedReading::new(
            self.recorded_at,
            self.emotions.clone(),
            self.confidence,
            self.source,
        )
    }
}

pub struct AggregationStore {
    clock: Arc<dyn Clock>,
    is_recording: bool,
    start_time: Option<i64>,
    points: Vec<AggregatedDataPoint>,
}

impl std::fmt::Debug for AggregationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationStore")
            .field("is_recording", &self.is_recording)
            .field("start_time", &self.start_time)
            .field("points", &self.points.len())
            .finish()
    }
}

impl Default for AggregationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregationStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            is_recording: false,
            start_time: None,
            points: Vec::new(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    /// Discard prior points and start a fresh recording. Calling this while
    /// already recording restarts from scratch.
    pub fn start_recording(&mut self) {
        self.points.clear();
        self.start_time = Some(self.clock.now_ms());
        self.is_recording = true;
        debug!("Aggregation recording started");
    }

    pub fn stop_recording(&mut self) {
        self.is_recording = false;
        debug!("Aggregation recording stopped with {} points", self.points.len());
    }

    pub fn clear_data(&mut self) {
        self.points.clear();
        self.start_time = None;
    }

    /// Append a facial reading captured now.
    ///
    /// Returns `false` when the reading was dropped because no recording is
    /// active.
    pub fn add_data_point(
        &mut self,
        emotions: EmotionVector,
        face_predictions: Vec<FacePrediction>,
    ) -> bool {
        let confidence = face_predictions
            .iter()
            .filter_map(|f| f.prob)
            .fold(None, |best: Option<f64>, p| Some(best.map_or(p, |b| b.max(p))))
            .unwrap_or(1.0);
        let reading = TimestampedReading::new(
            self.clock.now_ms(),
            emotions,
            confidence,
            EmotionSource::Facial,
        );
        self.add_reading(reading, face_predictions)
    }

    /// Append a reading from any source.
    ///
    /// Returns `false` when the reading was dropped because no recording is
    /// active. Dropped readings are not queued.
    pub fn add_reading(
        &mut self,
        reading: TimestampedReading,
        face_predictions: Vec<FacePrediction>,
    ) -> bool {
        if !self.is_recording {
            trace!("Dropping {} reading, not recording", reading.source);
            return false;
        }

        let elapsed = self.elapsed_ms();
        self.points.push(AggregatedDataPoint {
            timestamp: format_elapsed(elapsed),
            recorded_at: reading.timestamp,
            source: reading.source,
            confidence: reading.confidence,
            emotions: reading.emotions,
            face_predictions,
        });
        true
    }

    /// Points in arrival order.
    pub fn get_aggregated_data(&self) -> &[AggregatedDataPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point count, wall-clock duration and top emotions.
    ///
    /// A store without points summarizes to all zeros.
    pub fn get_data_summary(&self) -> DataSummary {
        if self.points.is_empty() {
            return DataSummary::default();
        }

        DataSummary {
            total_points: self.points.len(),
            duration: self.elapsed_ms(),
            top_emotions: rank_top_emotions(
                self.points.iter().map(|p| &p.emotions),
                TOP_EMOTION_LIMIT,
            ),
        }
    }

    /// The stored points as a persistable reading timeline.
    pub fn timeline(&self) -> Vec<TimestampedReading> {
        self.points.iter().map(AggregatedDataPoint::to_reading).collect()
    }

    fn elapsed_ms(&self) -> i64 {
        self.start_time
            .map(|start| (self.clock.now_ms() - start).max(0))
            .unwrap_or(0)
    }
}

/// Format elapsed milliseconds as `HH:MM:SS`.
pub fn format_elapsed(elapsed_ms: i64) -> String {
    let total_secs = elapsed_ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregation::clock::ManualClock;
    use crate::core::emotion::EmotionSample;

    fn store() -> (AggregationStore, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        (AggregationStore::with_clock(Arc::new(clock.clone())), clock)
    }

    fn one(name: &str, score: f64) -> EmotionVector {
        vec![EmotionSample::new(name, score)].into()
    }

    #[test]
    fn test_drops_points_while_not_recording() {
        let (mut store, _) = store();
        for _ in 0..5 {
            assert!(!store.add_data_point(one("Joy", 0.5), vec![]));
        }
        assert!(store.is_empty());

        store.start_recording();
        store.add_data_point(one("Joy", 0.5), vec![]);
        store.stop_recording();
        assert!(!store.add_data_point(one("Joy", 0.5), vec![]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_start_recording_is_a_hard_reset() {
        let (mut store, clock) = store();
        store.start_recording();
        store.add_data_point(one("Joy", 0.5), vec![]);
        store.add_data_point(one("Awe", 0.5), vec![]);
        let first_start = store.start_time();

        clock.advance(5_000);
        store.start_recording();
        assert!(store.is_empty());
        assert!(store.is_recording());
        assert_eq!(store.start_time(), first_start.map(|s| s + 5_000));
    }

    #[test]
    fn test_empty_summary_is_zeroed() {
        let (store, _) = store();
        assert_eq!(store.get_data_summary(), DataSummary::default());
    }

    #[test]
    fn test_summary_ranks_by_appearance_average() {
        let (mut store, clock) = store();
        store.start_recording();
        store.add_data_point(one("Joy", 0.8), vec![]);
        store.add_data_point(one("Joy", 0.4), vec![]);
        store.add_data_point(one("Sadness", 0.2), vec![]);
        clock.advance(42_000);

        let summary = store.get_data_summary();
        assert_eq!(summary.total_points, 3);
        assert_eq!(summary.duration, 42_000);
        assert!(summary.top_emotions.len() <= 5);
        assert_eq!(summary.top_emotions[0].name, "Joy");
        assert!((summary.top_emotions[0].average_score - 0.6).abs() < 1e-9);
        assert_eq!(summary.top_emotions[1].name, "Sadness");
        assert!((summary.top_emotions[1].average_score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_duration_is_wall_clock_after_stop() {
        let (mut store, clock) = store();
        store.start_recording();
        store.add_data_point(one("Joy", 0.8), vec![]);
        store.stop_recording();
        clock.advance(10_000);
        assert_eq!(store.get_data_summary().duration, 10_000);
    }

    #[test]
    fn test_mixed_sources_keep_arrival_order() {
        let (mut store, clock) = store();
        store.start_recording();

        clock.advance(1_000);
        store.add_reading(
            TimestampedReading::new(clock.now_ms(), one("Joy", 0.7), 0.95, EmotionSource::Facial),
            vec![],
        );
        clock.advance(1_000);
        store.add_reading(
            TimestampedReading::new(clock.now_ms(), one("Calmness", 0.4), 1.0, EmotionSource::Vocal),
            vec![],
        );
        clock.advance(1_000);
        store.add_reading(
            TimestampedReading::new(clock.now_ms(), one("Interest", 0.3), 0.9, EmotionSource::Facial),
            vec![],
        );
        store.stop_recording();

        let points = store.get_aggregated_data();
        assert_eq!(points.len(), 3);
        let sources: Vec<EmotionSource> = points.iter().map(|p| p.source).collect();
        assert_eq!(
            sources,
            vec![EmotionSource::Facial, EmotionSource::Vocal, EmotionSource::Facial]
        );
        let labels: Vec<&str> = points.iter().map(|p| p.timestamp.as_str()).collect();
        assert_eq!(labels, vec!["00:00:01", "00:00:02", "00:00:03"]);
        assert_eq!(store.timeline()[1].source, EmotionSource::Vocal);
    }

    #[test]
    fn test_add_data_point_uses_best_face_probability() {
        let (mut store, _) = store();
        store.start_recording();
        let faces = vec![
            FacePrediction {
                face_id: None,
                frame: None,
                time: None,
                prob: Some(0.7),
                bounding_box: None,
                emotions: vec![],
            },
            FacePrediction {
                face_id: None,
                frame: None,
                time: None,
                prob: Some(0.93),
                bounding_box: None,
                emotions: vec![],
            },
        ];
        store.add_data_point(one("Joy", 0.5), faces);
        let point = &store.get_aggregated_data()[0];
        assert_eq!(point.confidence, 0.93);
        assert_eq!(point.face_predictions.len(), 2);
    }

    #[test]
    fn test_clear_data() {
        let (mut store, _) = store();
        store.start_recording();
        store.add_data_point(one("Joy", 0.5), vec![]);
        store.stop_recording();
        store.clear_data();
        assert!(store.is_empty());
        assert_eq!(store.start_time(), None);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(59_999), "00:00:59");
        assert_eq!(format_elapsed(3_661_000), "01:01:01");
        assert_eq!(format_elapsed(-5), "00:00:00");
    }
}
