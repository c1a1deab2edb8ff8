//! Base types shared by all ingress adapters.
//!
//! An adapter owns one vendor WebSocket connection. It is created idle,
//! started with [`IngressAdapter::connect`], and pushes parsed
//! [`IngressEvent`]s into a channel owned by the session loop until
//! [`IngressAdapter::dispose`] is called or it gives up.

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::emotion::{EmotionSource, FacePrediction, TimestampedReading};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to an emotion vendor.
#[derive(Debug, Error)]
pub enum IngressError {
    /// Missing, rejected or expired credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Socket could not be opened or dropped unexpectedly
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection establishment exceeded the configured timeout
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// The vendor reported a hard error in its payload
    #[error("Vendor error ({code}): {message}")]
    Vendor { code: String, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A connection attempt is already in flight or established
    #[error("Adapter is already connected")]
    AlreadyConnected,
}

impl IngressError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            IngressError::AuthenticationFailed(_) => FailureKind::Authentication,
            IngressError::Vendor { .. } => FailureKind::Vendor,
            _ => FailureKind::Connection,
        }
    }
}

/// Result type for ingress operations.
pub type IngressResult<T> = Result<T, IngressError>;

// =============================================================================
// Status / Events
// =============================================================================

/// Per-channel connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Terminal: the adapter stopped retrying.
    Error,
}

impl fmt::Display for AdapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterStatus::Disconnected => write!(f, "disconnected"),
            AdapterStatus::Connecting => write!(f, "connecting"),
            AdapterStatus::Connected => write!(f, "connected"),
            AdapterStatus::Error => write!(f, "error"),
        }
    }
}

/// Why an adapter stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Credentials were rejected; the session falls back to demo data.
    Authentication,
    /// Reconnect attempts were exhausted.
    Connection,
    /// The vendor reported a hard error.
    Vendor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Assistant,
}

/// Everything an adapter reports to its owning session.
#[derive(Debug, Clone)]
pub enum IngressEvent {
    Reading {
        reading: TimestampedReading,
        face_predictions: Vec<FacePrediction>,
    },
    /// The vendor currently detects nothing (no face / no voice).
    Cleared { source: EmotionSource },
    Status {
        source: EmotionSource,
        status: AdapterStatus,
    },
    Failed {
        source: EmotionSource,
        kind: FailureKind,
        message: String,
    },
    Transcript {
        role: TranscriptRole,
        text: String,
        interim: bool,
    },
    AssistantAudio { data: Bytes },
}

/// Media pushed from the browser towards the adapters.
#[derive(Debug, Clone)]
pub enum CaptureInput {
    /// Base64 encoded JPEG frame.
    Frame(String),
    /// Raw microphone bytes.
    Audio(Bytes),
}

// =============================================================================
// Reconnect policy
// =============================================================================

/// Bounded reconnect behavior for vendor sockets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Reconnects allowed after the first failure. The connection that
    /// fails `max_reconnects + 1` times in a row is abandoned.
    /// Default: 3
    pub max_reconnects: u32,

    /// Default: 500ms
    pub initial_delay_ms: u64,

    /// Default: 5000ms
    pub max_delay_ms: u64,

    /// Default: 2.0
    pub backoff_multiplier: f32,

    /// Add up to 25% random jitter to each delay.
    /// Default: true
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_reconnects: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect number `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay_ms as f64;
        let multiplier = self.backoff_multiplier as f64;

        let delay = base_delay * multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = delay.min(self.max_delay_ms as f64);

        let delay = if self.jitter && delay > 0.0 {
            delay + rand::thread_rng().gen_range(0.0..=delay * 0.25)
        } else {
            delay
        };
        Duration::from_millis(delay as u64)
    }

    /// Whether another connection is allowed after `consecutive_failures`.
    pub fn should_retry(&self, consecutive_failures: u32) -> bool {
        consecutive_failures <= self.max_reconnects
    }
}

// =============================================================================
// Adapter Trait
// =============================================================================

/// One vendor ingress channel with an explicit connect/dispose lifecycle.
#[async_trait]
pub trait IngressAdapter: Send {
    fn source(&self) -> EmotionSource;

    fn status(&self) -> AdapterStatus;

    /// Whether this adapter synthesizes data instead of calling a vendor.
    fn is_demo(&self) -> bool {
        false
    }

    /// Start the adapter. Events are delivered on `events` until the adapter
    /// is disposed or fails terminally.
    ///
    /// Returns [`IngressError::AuthenticationFailed`] without opening a
    /// socket when no credentials are configured, and
    /// [`IngressError::AlreadyConnected`] when a connection is in flight.
    async fn connect(&mut self, events: mpsc::Sender<IngressEvent>) -> IngressResult<()>;

    /// Forward captured media. Adapters ignore inputs they don't consume.
    fn accept(&mut self, _input: &CaptureInput) {}

    /// Close the socket and stop all timers. Safe to call more than once.
    async fn dispose(&mut self);
}

/// Boxed adapter used by the session orchestrators.
pub type BoxedAdapter = Box<dyn IngressAdapter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_policy_bounds() {
        let policy = ReconnectPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn test_reconnect_delay_backoff_without_jitter() {
        let policy = ReconnectPolicy {
            jitter: false,
            ..Default::default()
        };
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(500));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(1000));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(2000));
        assert_eq!(policy.calculate_delay(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_reconnect_delay_jitter_range() {
        let policy = ReconnectPolicy::default();
        for _ in 0..20 {
            let d = policy.calculate_delay(1).as_millis();
            assert!((500..=625).contains(&d));
        }
    }

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            IngressError::AuthenticationFailed("x".into()).failure_kind(),
            FailureKind::Authentication
        );
        assert_eq!(
            IngressError::Vendor {
                code: "E1".into(),
                message: "bad".into()
            }
            .failure_kind(),
            FailureKind::Vendor
        );
        assert_eq!(
            IngressError::Timeout(Duration::from_secs(1)).failure_kind(),
            FailureKind::Connection
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(AdapterStatus::Error.to_string(), "error");
        assert_eq!(
            serde_json::to_string(&AdapterStatus::Connected).unwrap(),
            "\"connected\""
        );
    }
}
