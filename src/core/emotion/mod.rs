//! Emotion model shared by every ingress channel.
//!
//! # Architecture
//!
//! ```text
//! vendor JSON ──▶ catalog::map_vendor_scores ──▶ EmotionVector
//!                                                    │
//!                        ┌───────────────────────────┼──────────────────────┐
//!                        ▼                           ▼                      ▼
//!               scaling::scale_vector      StabilityFilter::update   AggregationStore
//!               (level indicators)         (primary descriptor)      (stored as-is)
//! ```
//!
//! Only names in the [`catalog`] survive the boundary; scaling and
//! stability are display concerns and never rewrite stored readings.

pub mod catalog;
pub mod scaling;
pub mod stability;
pub mod types;

pub use catalog::{
    EMOTION_COUNT, EMOTION_NAMES, EmotionRecord, canonical_name, descriptor, index_of,
    map_vendor_scores,
};
pub use scaling::{DEFAULT_LEVELS, EmotionLevel, level_for_score, min_max_normalize, scale_vector};
pub use stability::{StabilityConfig, StabilityFilter, StabilityUpdate};
pub use types::{
    BoundingBox, EmotionSample, EmotionSource, EmotionVector, FacePrediction, TimestampedReading,
};
