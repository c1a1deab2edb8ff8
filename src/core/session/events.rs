//! Events streamed from a session loop to the browser.

use serde::Serialize;

use super::call::CallPhase;
use super::checkin::CheckinPhase;
use super::overlay::EmotionOverlay;
use crate::core::aggregation::{AggregatedDataPoint, DataSummary};
use crate::core::emotion::EmotionSource;
use crate::core::ingress::{AdapterStatus, CaptureInput, TranscriptRole};

/// Commands accepted by the check-in loop.
#[derive(Debug)]
pub enum SessionCommand {
    Start {
        patient_id: Option<String>,
        duration_secs: Option<u64>,
    },
    Stop,
    Capture(CaptureInput),
    Shutdown,
}

/// Commands accepted by the call loop.
#[derive(Debug)]
pub enum CallCommand {
    Setup { room: String },
    Connected,
    End,
    Capture(CaptureInput),
    Shutdown,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Phase {
        phase: CheckinPhase,
    },
    CallPhase {
        phase: CallPhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        room: Option<String>,
    },
    Countdown {
        remaining_secs: u64,
    },
    Emotion(EmotionOverlay),
    Cleared {
        source: EmotionSource,
    },
    AdapterStatus {
        source: EmotionSource,
        status: AdapterStatus,
    },
    DemoMode {
        source: EmotionSource,
        reason: String,
    },
    Transcript {
        role: TranscriptRole,
        text: String,
        interim: bool,
    },
    /// Base64 encoded assistant audio.
    AssistantAudio {
        data: String,
    },
    Summary {
        summary: DataSummary,
        data_points: Vec<AggregatedDataPoint>,
    },
    Submitted {
        id: String,
    },
    SubmissionFailed {
        error: String,
    },
    Error {
        message: String,
    },
}

impl From<EmotionOverlay> for SessionEvent {
    fn from(overlay: EmotionOverlay) -> Self {
        SessionEvent::Emotion(overlay)
    }
}

impl SessionEvent {
    pub fn error(message: impl Into<String>) -> Self {
        SessionEvent::Error {
            message: message.into(),
        }
    }
}
