use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::core::emotion::EmotionVector;

/// Number of emotions reported in a summary.
pub const TOP_EMOTION_LIMIT: usize = 5;

/// Mean score of one emotion across the readings that contained it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionAverage {
    pub name: String,
    pub average_score: f64,
    /// Number of readings in which the emotion appeared.
    pub count: usize,
}

/// Summary statistics for one recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSummary {
    pub total_points: usize,
    /// Wall-clock milliseconds since recording started.
    pub duration: i64,
    pub top_emotions: Vec<EmotionAverage>,
}

/// Rank emotions by their per-appearance mean.
///
/// Each emotion's score sum is divided by the number of vectors that
/// contained it, not by the number of vectors overall. Results are sorted
/// descending and truncated to `limit`; equal averages keep first-seen order.
pub fn rank_top_emotions<'a, I>(vectors: I, limit: usize) -> Vec<EmotionAverage>
where
    I: IntoIterator<Item = &'a EmotionVector>,
{
    let mut order: Vec<(String, f64, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for vector in vectors {
        for sample in vector {
            match index.get(&sample.name) {
                Some(&i) => {
                    order[i].1 += sample.score;
                    order[i].2 += 1;
                }
                None => {
                    index.insert(sample.name.clone(), order.len());
                    order.push((sample.name.clone(), sample.score, 1));
                }
            }
        }
    }

    let mut averages: Vec<EmotionAverage> = order
        .into_iter()
        .map(|(name, sum, count)| EmotionAverage {
            name,
            average_score: sum / count as f64,
            count,
        })
        .collect();

    averages.sort_by(|a, b| {
        b.average_score
            .partial_cmp(&a.average_score)
            .unwrap_or(Ordering::Equal)
    });
    averages.truncate(limit);
    averages
}
