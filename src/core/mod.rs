pub mod aggregation;
pub mod emotion;
pub mod ingress;
pub mod report;
pub mod session;
pub mod storage;

// Re-export commonly used types for convenience
pub use aggregation::{AggregatedDataPoint, AggregationStore, DataSummary, EmotionAverage};
pub use emotion::{EmotionSample, EmotionSource, EmotionVector, TimestampedReading};
pub use ingress::{AdapterStatus, IngressAdapter, IngressError, IngressEvent};
pub use report::{GeneratedReport, ReportError, ReportGenerator, ReportRequest};
pub use session::{
    CallOrchestrator, CheckinOrchestrator, SessionCommand, SessionEvent, SessionOptions,
};
pub use storage::{CheckinRepository, StorageBackend, StorageError};
