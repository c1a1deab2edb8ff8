//! Facial expression stream configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::messages::{HUME_STREAM_DEFAULT_WINDOW_MS, HUME_STREAM_WEBSOCKET_URL};
use crate::core::ingress::base::ReconnectPolicy;

/// Configuration for the Hume streaming face model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacialConfig {
    /// Hume API key, sent in the `X-Hume-Api-Key` handshake header.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_websocket_url")]
    pub websocket_url: String,

    /// Cadence of the frame capture timer.
    #[serde(default = "default_capture_interval_ms")]
    pub capture_interval_ms: u64,

    /// Vendor-side analysis window sent with each frame.
    #[serde(default = "default_stream_window_ms")]
    pub stream_window_ms: u32,

    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

fn default_websocket_url() -> String {
    HUME_STREAM_WEBSOCKET_URL.to_string()
}

fn default_capture_interval_ms() -> u64 {
    500
}

fn default_stream_window_ms() -> u32 {
    HUME_STREAM_DEFAULT_WINDOW_MS
}

fn default_connection_timeout() -> u64 {
    10
}

impl Default for FacialConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            websocket_url: default_websocket_url(),
            capture_interval_ms: default_capture_interval_ms(),
            stream_window_ms: default_stream_window_ms(),
            connection_timeout_seconds: default_connection_timeout(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl FacialConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.websocket_url = url.into();
        self
    }

    pub fn with_capture_interval(mut self, interval: Duration) -> Self {
        self.capture_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    /// The configured key, if non-empty.
    pub fn credentials(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.capture_interval_ms == 0 {
            return Err("Capture interval must be greater than 0".to_string());
        }
        if self.stream_window_ms == 0 {
            return Err("Stream window must be greater than 0".to_string());
        }
        if !self.websocket_url.starts_with("ws://") && !self.websocket_url.starts_with("wss://") {
            return Err(format!("Invalid WebSocket URL: {}", self.websocket_url));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FacialConfig::default();
        assert_eq!(config.websocket_url, "wss://api.hume.ai/v0/stream/models");
        assert_eq!(config.capture_interval(), Duration::from_millis(500));
        assert_eq!(config.connection_timeout(), Duration::from_secs(10));
        assert_eq!(config.reconnect.max_reconnects, 3);
        assert!(config.credentials().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_key_is_no_credentials() {
        assert!(FacialConfig::new("  ").credentials().is_none());
        assert_eq!(FacialConfig::new("k").credentials(), Some("k"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = FacialConfig::new("k");
        config.capture_interval_ms = 0;
        assert!(config.validate().is_err());

        let config = FacialConfig::new("k").with_url("https://example.com");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: FacialConfig =
            serde_json::from_str(r#"{"api_key":"abc","capture_interval_ms":250}"#).unwrap();
        assert_eq!(config.credentials(), Some("abc"));
        assert_eq!(config.capture_interval_ms, 250);
        assert_eq!(config.stream_window_ms, 5000);
    }
}
