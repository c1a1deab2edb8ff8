//! In-memory aggregation of emotion readings for one recording session.

pub mod clock;
pub mod store;
pub mod summary;

pub use clock::{Clock, ManualClock, SystemClock, now_ms};
pub use store::{AggregatedDataPoint, AggregationStore, format_elapsed};
pub use summary::{DataSummary, EmotionAverage, TOP_EMOTION_LIMIT, rank_top_emotions};
