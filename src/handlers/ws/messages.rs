//! Browser relay message types
//!
//! Client frames are JSON text messages tagged by `type`. Binary frames are
//! microphone audio and never appear here. Server frames are serialized
//! [`SessionEvent`](crate::core::session::SessionEvent)s.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ingress::CaptureInput;
use crate::core::session::{CallCommand, SessionCommand};

/// Maximum size of a base64 camera frame (4 MB)
pub const MAX_FRAME_DATA_SIZE: usize = 4 * 1024 * 1024;

/// Maximum length of a patient or room identifier
pub const MAX_ID_LENGTH: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayValidationError {
    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Identifier too long: {size} characters (max {max})")]
    IdTooLong { size: usize, max: usize },

    #[error("Frame data is empty")]
    EmptyFrame,
}

fn check_frame(data: &str) -> Result<(), RelayValidationError> {
    if data.is_empty() {
        return Err(RelayValidationError::EmptyFrame);
    }
    if data.len() > MAX_FRAME_DATA_SIZE {
        return Err(RelayValidationError::FrameTooLarge {
            size: data.len(),
            max: MAX_FRAME_DATA_SIZE,
        });
    }
    Ok(())
}

fn check_id(id: Option<&str>) -> Result<(), RelayValidationError> {
    match id {
        Some(id) if id.chars().count() > MAX_ID_LENGTH => Err(RelayValidationError::IdTooLong {
            size: id.chars().count(),
            max: MAX_ID_LENGTH,
        }),
        _ => Ok(()),
    }
}

/// Messages accepted on `/ws/checkin`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckinClientMessage {
    Start {
        #[serde(default)]
        patient_id: Option<String>,
        /// Overrides the configured duration
        #[serde(default)]
        duration_secs: Option<u64>,
    },
    Stop,
    /// Base64 JPEG from the camera
    Frame { data: String },
}

impl CheckinClientMessage {
    pub fn validate(&self) -> Result<(), RelayValidationError> {
        match self {
            CheckinClientMessage::Start { patient_id, .. } => check_id(patient_id.as_deref()),
            CheckinClientMessage::Stop => Ok(()),
            CheckinClientMessage::Frame { data } => check_frame(data),
        }
    }

    pub fn into_command(self) -> SessionCommand {
        match self {
            CheckinClientMessage::Start {
                patient_id,
                duration_secs,
            } => SessionCommand::Start {
                patient_id,
                duration_secs,
            },
            CheckinClientMessage::Stop => SessionCommand::Stop,
            CheckinClientMessage::Frame { data } => {
                SessionCommand::Capture(CaptureInput::Frame(data))
            }
        }
    }
}

/// Messages accepted on `/ws/call`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallClientMessage {
    Setup { room: String },
    Connected,
    End,
    Frame { data: String },
}

impl CallClientMessage {
    pub fn validate(&self) -> Result<(), RelayValidationError> {
        match self {
            CallClientMessage::Setup { room } => check_id(Some(room)),
            CallClientMessage::Connected | CallClientMessage::End => Ok(()),
            CallClientMessage::Frame { data } => check_frame(data),
        }
    }

    pub fn into_command(self) -> CallCommand {
        match self {
            CallClientMessage::Setup { room } => CallCommand::Setup { room },
            CallClientMessage::Connected => CallCommand::Connected,
            CallClientMessage::End => CallCommand::End,
            CallClientMessage::Frame { data } => CallCommand::Capture(CaptureInput::Frame(data)),
        }
    }
}
