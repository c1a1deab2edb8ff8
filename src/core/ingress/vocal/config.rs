//! Hume EVI configuration for the vocal channel.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::messages::{
    AudioEncoding, HUME_EVI_DEFAULT_CHANNELS, HUME_EVI_DEFAULT_SAMPLE_RATE,
    HUME_EVI_MAX_SESSION_DURATION, HUME_EVI_WEBSOCKET_URL,
};
use crate::core::ingress::base::ReconnectPolicy;

/// Configuration for Hume EVI (Empathic Voice Interface).
///
/// # Audio Format
///
/// - Input: Linear16 PCM (44.1kHz, mono) or WebM
/// - Output: Base64-encoded WAV
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocalConfig {
    /// API key for Hume AI, passed as a query parameter.
    #[serde(default)]
    pub api_key: Option<String>,

    /// EVI configuration ID (created in Hume dashboard).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Session length cap in seconds. Zero disables the cap.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,

    /// Silence before EVI ends the chat, in seconds. Zero disables it.
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,

    #[serde(default)]
    pub input_encoding: AudioEncoding,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u8,

    /// Outbound audio is buffered into chunks of exactly this many bytes.
    #[serde(default = "default_chunk_bytes")]
    pub audio_chunk_bytes: usize,

    /// WebSocket URL (defaults to Hume's production endpoint).
    #[serde(default = "default_websocket_url")]
    pub websocket_url: String,

    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

fn default_max_duration() -> u64 {
    HUME_EVI_MAX_SESSION_DURATION
}

fn default_inactivity_timeout() -> u64 {
    120
}

fn default_sample_rate() -> u32 {
    HUME_EVI_DEFAULT_SAMPLE_RATE
}

fn default_channels() -> u8 {
    HUME_EVI_DEFAULT_CHANNELS
}

fn default_chunk_bytes() -> usize {
    4096
}

fn default_websocket_url() -> String {
    HUME_EVI_WEBSOCKET_URL.to_string()
}

fn default_connection_timeout() -> u64 {
    10
}

impl Default for VocalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            config_id: None,
            system_prompt: None,
            voice_id: None,
            language: None,
            max_duration_secs: default_max_duration(),
            inactivity_timeout_secs: default_inactivity_timeout(),
            input_encoding: AudioEncoding::default(),
            sample_rate: HUME_EVI_DEFAULT_SAMPLE_RATE,
            channels: HUME_EVI_DEFAULT_CHANNELS,
            audio_chunk_bytes: default_chunk_bytes(),
            websocket_url: default_websocket_url(),
            connection_timeout_seconds: default_connection_timeout(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl VocalConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    pub fn with_config_id(mut self, config_id: impl Into<String>) -> Self {
        self.config_id = Some(config_id.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.websocket_url = url.into();
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn credentials(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    /// Build the WebSocket URL with query parameters.
    pub fn build_websocket_url(&self) -> String {
        fn encode(s: &str) -> String {
            url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
        }

        let mut params = Vec::new();
        if let Some(api_key) = self.credentials() {
            params.push(format!("api_key={}", encode(api_key)));
        }
        if let Some(ref config_id) = self.config_id {
            params.push(format!("config_id={}", encode(config_id)));
        }

        let mut url = self.websocket_url.clone();
        if !params.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&params.join("&"));
        }
        url
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("Sample rate must be greater than 0".to_string());
        }
        if self.channels == 0 {
            return Err("Channels must be greater than 0".to_string());
        }
        if self.audio_chunk_bytes == 0 {
            return Err("Audio chunk size must be greater than 0".to_string());
        }
        if self.max_duration_secs > HUME_EVI_MAX_SESSION_DURATION {
            return Err(format!(
                "Max duration cannot exceed {HUME_EVI_MAX_SESSION_DURATION} seconds"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_websocket_url() {
        let config = VocalConfig::new("my key").with_config_id("cfg-1");
        let url = config.build_websocket_url();
        assert!(url.starts_with("wss://api.hume.ai/v0/evi/chat?"));
        assert!(url.contains("api_key=my+key"));
        assert!(url.contains("config_id=cfg-1"));
    }

    #[test]
    fn test_build_websocket_url_appends_to_existing_query() {
        let config = VocalConfig::new("k").with_url("ws://127.0.0.1:9000/chat?x=1");
        assert_eq!(config.build_websocket_url(), "ws://127.0.0.1:9000/chat?x=1&api_key=k");
    }

    #[test]
    fn test_validate() {
        assert!(VocalConfig::new("k").validate().is_ok());

        let mut config = VocalConfig::new("k");
        config.audio_chunk_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = VocalConfig::new("k");
        config.max_duration_secs = 4000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = VocalConfig::default();
        assert!(config.credentials().is_none());
        assert_eq!(config.audio_chunk_bytes, 4096);
        assert_eq!(config.connection_timeout(), Duration::from_secs(10));
    }
}
