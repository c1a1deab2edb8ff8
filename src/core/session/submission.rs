//! The persisted shape of a finished check-in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::emotion::TimestampedReading;
use crate::core::storage::StorageError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinSubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    pub emotion_timeline: Vec<TimestampedReading>,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl CheckinSubmission {
    /// Build a submission stamped with the current UTC time.
    pub fn new(
        patient_id: Option<String>,
        transcript: Option<String>,
        emotion_timeline: Vec<TimestampedReading>,
    ) -> Self {
        Self {
            patient_id,
            transcript,
            emotion_timeline,
            created_at: rfc3339_now(),
        }
    }
}

pub fn rfc3339_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::UNIX_EPOCH.to_string())
}

/// Destination for finished check-ins.
#[async_trait]
pub trait CheckinSink: Send + Sync {
    /// Persist `submission` and return its id.
    async fn submit(&self, submission: &CheckinSubmission) -> Result<String, StorageError>;
}
