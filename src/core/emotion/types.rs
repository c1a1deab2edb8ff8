//! Core emotion data types shared by every ingress channel.
//!
//! Vendor payloads are converted into these closed shapes at the adapter
//! boundary; nothing downstream ever sees raw vendor JSON except the
//! [`FacePrediction`] traceability record.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// =============================================================================
// Emotion Sample / Vector
// =============================================================================

/// One scored emotion reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSample {
    /// Canonical catalog name (e.g. "Joy", "Surprise (positive)").
    pub name: String,
    /// Vendor-supplied probability or intensity, nominally in `[0, 1]`.
    pub score: f64,
}

impl EmotionSample {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// The emotions produced by one detection event (one video frame or one
/// utterance), in vendor insertion order.
///
/// Display code re-sorts by score; the stored order is never changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmotionVector(Vec<EmotionSample>);

impl EmotionVector {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_samples(samples: Vec<EmotionSample>) -> Self {
        Self(samples)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EmotionSample> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[EmotionSample] {
        &self.0
    }

    /// Score for `name`, matched exactly against the canonical name.
    pub fn score_of(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|s| s.name == name).map(|s| s.score)
    }

    /// Samples sorted by descending score. Equal scores keep insertion order.
    pub fn sorted_by_score(&self) -> Vec<&EmotionSample> {
        let mut sorted: Vec<&EmotionSample> = self.0.iter().collect();
        sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        sorted
    }

    /// The `n` highest scoring samples.
    pub fn top(&self, n: usize) -> Vec<&EmotionSample> {
        let mut sorted = self.sorted_by_score();
        sorted.truncate(n);
        sorted
    }

    /// Highest scoring sample, if any.
    pub fn dominant(&self) -> Option<&EmotionSample> {
        self.top(1).into_iter().next()
    }

    pub(crate) fn samples_mut(&mut self) -> &mut Vec<EmotionSample> {
        &mut self.0
    }
}

impl From<Vec<EmotionSample>> for EmotionVector {
    fn from(samples: Vec<EmotionSample>) -> Self {
        Self(samples)
    }
}

impl<'a> IntoIterator for &'a EmotionVector {
    type Item = &'a EmotionSample;
    type IntoIter = std::slice::Iter<'a, EmotionSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Readings
// =============================================================================

/// Which ingress channel produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionSource {
    Facial,
    Vocal,
}

impl EmotionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionSource::Facial => "facial",
            EmotionSource::Vocal => "vocal",
        }
    }

    /// Parse the wire representation. Matching is exact, as stored readings
    /// are always written in lowercase.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "facial" => Some(EmotionSource::Facial),
            "vocal" => Some(EmotionSource::Vocal),
            _ => None,
        }
    }
}

impl fmt::Display for EmotionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reading as handed from an ingress adapter to the aggregation store, and
/// as persisted in a check-in's emotion timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampedReading {
    /// Capture time in epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub emotions: EmotionVector,
    pub confidence: f64,
    pub source: EmotionSource,
}

impl TimestampedReading {
    pub fn new(
        timestamp: i64,
        emotions: EmotionVector,
        confidence: f64,
        source: EmotionSource,
    ) -> Self {
        Self {
            timestamp,
            emotions,
            confidence,
            source,
        }
    }
}

// =============================================================================
// Raw face predictions
// =============================================================================

/// Face bounding box in source-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Raw vendor face payload retained next to the normalized vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacePrediction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prob: Option<f64>,
    #[serde(default, rename = "box", skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub emotions: Vec<EmotionSample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(pairs: &[(&str, f64)]) -> EmotionVector {
        pairs
            .iter()
            .map(|(name, score)| EmotionSample::new(*name, *score))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_sorted_by_score_keeps_insertion_order_for_ties() {
        let v = vector(&[("Calmness", 0.3), ("Joy", 0.7), ("Interest", 0.3)]);
        let names: Vec<&str> = v.sorted_by_score().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Joy", "Calmness", "Interest"]);
        // Stored order is untouched
        assert_eq!(v.as_slice()[0].name, "Calmness");
    }

    #[test]
    fn test_dominant_and_top() {
        let v = vector(&[("Sadness", 0.1), ("Joy", 0.9), ("Awe", 0.5)]);
        assert_eq!(v.dominant().map(|s| s.name.as_str()), Some("Joy"));
        assert_eq!(v.top(2).len(), 2);
        assert_eq!(v.top(10).len(), 3);
        assert!(EmotionVector::new().dominant().is_none());
    }

    #[test]
    fn test_reading_wire_format() {
        let reading = TimestampedReading::new(
            1_700_000_000_000,
            vector(&[("Joy", 0.5)]),
            0.9,
            EmotionSource::Vocal,
        );
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
        assert_eq!(json["source"], "vocal");
        assert_eq!(json["emotions"][0]["name"], "Joy");

        let back: TimestampedReading = serde_json::from_value(json).unwrap();
        assert_eq!(back, reading);
    }

    #[test]
    fn test_face_prediction_box_rename() {
        let json = r#"{"faceId":"f0","prob":0.98,"box":{"x":1.0,"y":2.0,"w":30.0,"h":40.0},"emotions":[{"name":"Joy","score":0.4}]}"#;
        let face: FacePrediction = serde_json::from_str(json).unwrap();
        assert_eq!(face.prob, Some(0.98));
        assert_eq!(face.bounding_box.map(|b| b.w), Some(30.0));
        assert_eq!(face.emotions.len(), 1);
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(EmotionSource::parse("facial"), Some(EmotionSource::Facial));
        assert_eq!(EmotionSource::parse("vocal"), Some(EmotionSource::Vocal));
        assert_eq!(EmotionSource::parse("Facial"), None);
        assert_eq!(EmotionSource::Vocal.to_string(), "vocal");
    }
}
