//! Display scaling for emotion scores.
//!
//! These helpers only feed level indicators; stored readings are never
//! rescaled.

use serde::Serialize;

use super::types::{EmotionSample, EmotionVector};

/// Default number of discrete indicator levels.
pub const DEFAULT_LEVELS: u32 = 5;

/// One emotion mapped onto a discrete indicator level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmotionLevel {
    pub name: String,
    pub level: u32,
}

/// Map a raw score onto `0..=levels`.
///
/// Returns the highest `i` (counting down from `levels`) whose threshold
/// `i / (levels + 1)` the score strictly exceeds, else `0`.
pub fn level_for_score(score: f64, levels: u32) -> u32 {
    let denominator = f64::from(levels) + 1.0;
    (0..=levels)
        .rev()
        .find(|&i| score > f64::from(i) / denominator)
        .unwrap_or(0)
}

/// Level every sample of `vector`, preserving its order.
pub fn scale_vector(vector: &EmotionVector, levels: u32) -> Vec<EmotionLevel> {
    vector
        .iter()
        .map(|sample| EmotionLevel {
            name: sample.name.clone(),
            level: level_for_score(sample.score, levels),
        })
        .collect()
}

/// Min-max rescale of `vector` into `[0, 1]`.
///
/// A vector whose scores are all equal rescales to all zeros.
pub fn min_max_normalize(vector: &EmotionVector) -> EmotionVector {
    let (min, max) = vector.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s.score), hi.max(s.score))
    });
    let range = max - min;

    vector
        .iter()
        .map(|s| {
            let score = if range > 0.0 { (s.score - min) / range } else { 0.0 };
            EmotionSample::new(s.name.clone(), score)
        })
        .collect::<Vec<_>>()
        .into()
}
