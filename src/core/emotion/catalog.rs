//! The closed set of expression dimensions reported by Hume's face and
//! prosody models.
//!
//! Vendor emotion names are matched case-insensitively against this catalog
//! and anything outside it is dropped. The catalog order also fixes the
//! layout of [`EmotionRecord`], the dense vector used for distance
//! comparisons.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::types::{EmotionSample, EmotionVector};

/// Number of known expression dimensions.
pub const EMOTION_COUNT: usize = 50;

/// Canonical names, in record order.
pub const EMOTION_NAMES: [&str; EMOTION_COUNT] = [
    "Admiration",
    "Adoration",
    "Aesthetic Appreciation",
    "Amusement",
    "Anger",
    "Anxiety",
    "Awe",
    "Awkwardness",
    "Boredom",
    "Calmness",
    "Concentration",
    "Confusion",
    "Contemplation",
    "Contempt",
    "Contentment",
    "Craving",
    "Desire",
    "Determination",
    "Disappointment",
    "Disgust",
    "Distress",
    "Doubt",
    "Ecstasy",
    "Embarrassment",
    "Empathic Pain",
    "Enthusiasm",
    "Entrancement",
    "Envy",
    "Excitement",
    "Fear",
    "Gratitude",
    "Guilt",
    "Horror",
    "Interest",
    "Joy",
    "Love",
    "Nostalgia",
    "Pain",
    "Pride",
    "Realization",
    "Relief",
    "Romance",
    "Sadness",
    "Satisfaction",
    "Shame",
    "Surprise (negative)",
    "Surprise (positive)",
    "Sympathy",
    "Tiredness",
    "Triumph",
];

/// Adjective form of each emotion, used for compound descriptors such as
/// "calm joy".
const DESCRIPTORS: [&str; EMOTION_COUNT] = [
    "admiring",
    "adoring",
    "appreciative",
    "amused",
    "angry",
    "anxious",
    "awestruck",
    "awkward",
    "bored",
    "calm",
    "focused",
    "confused",
    "contemplative",
    "contemptuous",
    "content",
    "craving",
    "desirous",
    "determined",
    "disappointed",
    "disgusted",
    "distressed",
    "doubtful",
    "ecstatic",
    "embarrassed",
    "empathic",
    "enthusiastic",
    "entranced",
    "envious",
    "excited",
    "fearful",
    "grateful",
    "guilty",
    "horrified",
    "interested",
    "joyful",
    "loving",
    "nostalgic",
    "pained",
    "proud",
    "realizing",
    "relieved",
    "romantic",
    "sad",
    "satisfied",
    "ashamed",
    "startled",
    "surprised",
    "sympathetic",
    "tired",
    "triumphant",
];

static INDEX: Lazy<HashMap<String, usize>> = Lazy::new(|| {
    EMOTION_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| (normalize_key(name), i))
        .collect()
});

fn normalize_key(raw: &str) -> String {
    raw.trim().replace('_', " ").to_lowercase()
}

/// Catalog position of a vendor emotion name, ignoring case and treating
/// `_` as a space.
pub fn index_of(raw: &str) -> Option<usize> {
    INDEX.get(&normalize_key(raw)).copied()
}

/// Canonical spelling of a vendor emotion name.
pub fn canonical_name(raw: &str) -> Option<&'static str> {
    index_of(raw).map(|i| EMOTION_NAMES[i])
}

/// Adjective form of an emotion name.
pub fn descriptor(raw: &str) -> Option<&'static str> {
    index_of(raw).map(|i| DESCRIPTORS[i])
}

/// Map vendor `(name, score)` pairs into an [`EmotionVector`].
///
/// Unknown names and non-finite scores are dropped. When a frame repeats a
/// name, the last score wins and the sample keeps its first position.
pub fn map_vendor_scores<I, S>(pairs: I) -> EmotionVector
where
    I: IntoIterator<Item = (S, f64)>,
    S: AsRef<str>,
{
    let mut positions: [Option<usize>; EMOTION_COUNT] = [None; EMOTION_COUNT];
    let mut vector = EmotionVector::new();

    for (raw_name, score) in pairs {
        if !score.is_finite() {
            continue;
        }
        let Some(idx) = index_of(raw_name.as_ref()) else {
            continue;
        };
        let samples = vector.samples_mut();
        match positions[idx] {
            Some(pos) => samples[pos].score = score,
            None => {
                positions[idx] = Some(samples.len());
                samples.push(EmotionSample::new(EMOTION_NAMES[idx], score));
            }
        }
    }

    vector
}

// =============================================================================
// Dense record
// =============================================================================

/// Fixed-shape score record, one slot per catalog emotion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionRecord {
    scores: [f64; EMOTION_COUNT],
}

impl Default for EmotionRecord {
    fn default() -> Self {
        Self {
            scores: [0.0; EMOTION_COUNT],
        }
    }
}

impl EmotionRecord {
    pub fn from_vector(vector: &EmotionVector) -> Self {
        let mut record = Self::default();
        for sample in vector {
            if let Some(idx) = index_of(&sample.name) {
                record.scores[idx] = sample.score;
            }
        }
        record
    }

    pub fn scores(&self) -> &[f64; EMOTION_COUNT] {
        &self.scores
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        index_of(name).map(|i| self.scores[i])
    }

    /// Element-wise mean of `records`. An empty input yields the zero record.
    pub fn mean<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a EmotionRecord>,
    {
        let mut sum = [0.0; EMOTION_COUNT];
        let mut count = 0usize;
        for record in records {
            for (acc, v) in sum.iter_mut().zip(record.scores.iter()) {
                *acc += v;
            }
            count += 1;
        }
        if count > 0 {
            for v in sum.iter_mut() {
                *v /= count as f64;
            }
        }
        Self { scores: sum }
    }

    /// Euclidean distance between two records.
    pub fn distance(&self, other: &EmotionRecord) -> f64 {
        self.scores
            .iter()
            .zip(other.scores.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// The two highest slots as `(catalog index, score)`, highest first.
    /// Ties resolve to the lower catalog index.
    pub fn top_two(&self) -> (Option<(usize, f64)>, Option<(usize, f64)>) {
        let mut first: Option<(usize, f64)> = None;
        let mut second: Option<(usize, f64)> = None;
        for (i, &score) in self.scores.iter().enumerate() {
            match first {
                Some((_, best)) if score <= best => {
                    if second.is_none_or(|(_, s)| score > s) {
                        second = Some((i, score));
                    }
                }
                _ => {
                    second = first;
                    first = Some((i, score));
                }
            }
        }
        (first, second)
    }
}
