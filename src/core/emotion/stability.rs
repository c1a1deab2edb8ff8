//! Flicker suppression for the displayed "primary descriptor".
//!
//! Recent vectors are averaged over a sliding window into a dense
//! [`EmotionRecord`]. The label only moves when that average drifts further
//! than `embedding_threshold` from the average that produced the current
//! label.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::catalog::{EMOTION_NAMES, EmotionRecord, descriptor};
use super::types::EmotionVector;

/// Stability filter tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Number of recent vectors averaged together.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Minimum embedding distance that changes the label.
    #[serde(default = "default_embedding_threshold")]
    pub embedding_threshold: f64,
    /// When the top two scores are closer than this, the label becomes a
    /// compound "descriptor + emotion" phrase.
    #[serde(default = "default_emotion_threshold")]
    pub emotion_threshold: f64,
}

fn default_window_size() -> usize {
    4
}

fn default_embedding_threshold() -> f64 {
    0.2
}

fn default_emotion_threshold() -> f64 {
    0.1
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            embedding_threshold: default_embedding_threshold(),
            emotion_threshold: default_emotion_threshold(),
        }
    }
}

/// Result of feeding one vector to the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilityUpdate {
    pub label: Option<String>,
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct StabilityFilter {
    config: StabilityConfig,
    window: VecDeque<EmotionRecord>,
    anchor: Option<EmotionRecord>,
    label: Option<String>,
}

impl StabilityFilter {
    pub fn new(config: StabilityConfig) -> Self {
        let capacity = config.window_size.max(1);
        Self {
            config,
            window: VecDeque::with_capacity(capacity),
            anchor: None,
            label: None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Push a vector into the window and recompute the label if the averaged
    /// embedding moved past the threshold. Empty vectors leave the filter
    /// untouched.
    pub fn update(&mut self, vector: &EmotionVector) -> StabilityUpdate {
        if vector.is_empty() {
            return StabilityUpdate {
                label: self.label.clone(),
                changed: false,
            };
        }

        if self.window.len() == self.config.window_size.max(1) {
            self.window.pop_front();
        }
        self.window.push_back(EmotionRecord::from_vector(vector));
        let embedding = EmotionRecord::mean(self.window.iter());

        let moved = match &self.anchor {
            None => true,
            Some(anchor) => embedding.distance(anchor) > self.config.embedding_threshold,
        };

        let mut changed = false;
        if moved {
            let label = self.describe(&embedding);
            changed = label != self.label;
            self.label = label;
            self.anchor = Some(embedding);
        }

        StabilityUpdate {
            label: self.label.clone(),
            changed,
        }
    }

    /// Forget the window and the current label.
    pub fn reset(&mut self) {
        self.window.clear();
        self.anchor = None;
        self.label = None;
    }

    fn describe(&self, embedding: &EmotionRecord) -> Option<String> {
        let (first, second) = embedding.top_two();
        let (top_idx, top_score) = first?;
        if top_score <= 0.0 {
            return None;
        }
        let top = EMOTION_NAMES[top_idx];

        match second {
            Some((second_idx, second_score))
                if second_score > 0.0 && top_score - second_score < self.config.emotion_threshold =>
            {
                let adjective = descriptor(EMOTION_NAMES[second_idx]).unwrap_or("mild");
                Some(format!("{} {}", adjective, top.to_lowercase()))
            }
            _ => Some(top.to_string()),
        }
    }
}

impl Default for StabilityFilter {
    fn default() -> Self {
        Self::new(StabilityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::emotion::catalog::map_vendor_scores;

    fn single_window() -> StabilityFilter {
        StabilityFilter::new(StabilityConfig {
            window_size: 1,
            ..StabilityConfig::default()
        })
    }

    #[test]
    fn test_first_vector_sets_label() {
        let mut filter = single_window();
        let update = filter.update(&map_vendor_scores(vec![("Joy", 0.9), ("Awe", 0.1)]));
        assert!(update.changed);
        assert_eq!(update.label.as_deref(), Some("Joy"));
    }

    #[test]
    fn test_small_change_keeps_label() {
        let mut filter = single_window();
        filter.update(&map_vendor_scores(vec![("Joy", 0.9), ("Sadness", 0.1)]));

        // Distance ~0.11, below the 0.2 threshold
        let update = filter.update(&map_vendor_scores(vec![("Joy", 0.8), ("Sadness", 0.15)]));
        assert!(!update.changed);
        assert_eq!(update.label.as_deref(), Some("Joy"));
    }

    #[test]
    fn test_small_change_does_not_flip_close_ranking() {
        let mut filter = single_window();
        filter.update(&map_vendor_scores(vec![("Joy", 0.45), ("Sadness", 0.3)]));

        // Sadness now leads, but the embedding only moved by ~0.14
        let update = filter.update(&map_vendor_scores(vec![("Joy", 0.35), ("Sadness", 0.4)]));
        assert!(!update.changed);
        assert_eq!(filter.label(), Some("Joy"));
    }

    #[test]
    fn test_large_change_updates_label() {
        let mut filter = single_window();
        filter.update(&map_vendor_scores(vec![("Joy", 0.9)]));

        let update = filter.update(&map_vendor_scores(vec![("Joy", 0.1), ("Sadness", 0.9)]));
        assert!(update.changed);
        assert_eq!(update.label.as_deref(), Some("Sadness"));
    }

    #[test]
    fn test_close_scores_produce_compound_descriptor() {
        let mut filter = single_window();
        let update = filter.update(&map_vendor_scores(vec![("Joy", 0.55), ("Calmness", 0.5)]));
        assert_eq!(update.label.as_deref(), Some("calm joy"));
    }

    #[test]
    fn test_window_averaging_damps_single_outlier() {
        let mut filter = StabilityFilter::new(StabilityConfig {
            window_size: 4,
            ..StabilityConfig::default()
        });
        for _ in 0..4 {
            filter.update(&map_vendor_scores(vec![("Joy", 0.6)]));
        }
        // One frame of sadness only moves the windowed average by ~0.16
        let update = filter.update(&map_vendor_scores(vec![("Sadness", 0.2)]));
        assert!(!update.changed);
        assert_eq!(update.label.as_deref(), Some("Joy"));
    }

    #[test]
    fn test_empty_vector_and_reset() {
        let mut filter = single_window();
        filter.update(&map_vendor_scores(vec![("Joy", 0.9)]));
        let update = filter.update(&EmotionVector::new());
        assert!(!update.changed);
        assert_eq!(update.label.as_deref(), Some("Joy"));

        filter.reset();
        assert_eq!(filter.label(), None);
    }
}
