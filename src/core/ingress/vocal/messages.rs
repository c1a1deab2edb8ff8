//! Hume EVI message types.
//!
//! ```text
//! Client → Server:
//!   - SessionSettings (prompt, voice, language, timeouts, audio format)
//!   - AudioInput (base64-encoded audio chunks)
//!
//! Server → Client:
//!   - ChatMetadata / SessionStatus (on connection)
//!   - UserMessage (transcription + prosody under models.prosody.scores)
//!   - AssistantMessage (response text)
//!   - AudioOutput (base64 WAV)
//!   - AssistantEnd
//!   - Error
//! ```

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::core::emotion::{EmotionVector, map_vendor_scores};

// =============================================================================
// Constants
// =============================================================================

/// Hume EVI WebSocket endpoint URL.
pub const HUME_EVI_WEBSOCKET_URL: &str = "wss://api.hume.ai/v0/evi/chat";

/// Default sample rate for EVI audio input (Hz).
pub const HUME_EVI_DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default number of audio channels (mono).
pub const HUME_EVI_DEFAULT_CHANNELS: u8 = 1;

/// Maximum EVI session duration in seconds (30 minutes).
pub const HUME_EVI_MAX_SESSION_DURATION: u64 = 1800;

// =============================================================================
// Client → Server Messages
// =============================================================================

/// Messages sent from client to Hume EVI server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EVIClientMessage {
    /// One-time session configuration, sent right after the socket opens.
    SessionSettings(SessionSettings),
    AudioInput(AudioInput),
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub audio: AudioSettings,
    pub timeouts: SessionTimeouts,
}

/// Audio format settings.
#[derive(Debug, Clone, Serialize)]
pub struct AudioSettings {
    /// Encoding format (linear16 or webm).
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub channels: u8,
}

/// Supported audio encodings for EVI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    /// Linear 16-bit PCM, little-endian.
    #[default]
    Linear16,
    /// WebM container format (what browser MediaRecorder produces).
    Webm,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionTimeouts {
    pub inactivity: TimeoutSetting,
    pub max_duration: TimeoutSetting,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeoutSetting {
    pub enabled: bool,
    pub duration_secs: u64,
}

impl TimeoutSetting {
    pub fn seconds(duration_secs: u64) -> Self {
        Self {
            enabled: duration_secs > 0,
            duration_secs,
        }
    }
}

/// Audio input message containing base64-encoded audio.
#[derive(Debug, Clone, Serialize)]
pub struct AudioInput {
    pub data: String,
}

impl AudioInput {
    pub fn from_bytes(audio_data: &[u8]) -> Self {
        Self {
            data: BASE64.encode(audio_data),
        }
    }
}

// =============================================================================
// Server → Client Messages
// =============================================================================

/// Messages received from Hume EVI server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EVIServerMessage {
    ChatMetadata(ChatMetadata),
    SessionStatus(SessionStatus),
    UserMessage(UserMessage),
    AssistantMessage(AssistantMessage),
    AudioOutput(AudioOutput),
    AssistantEnd(AssistantEnd),
    Error(EVIError),
    /// Unknown message type (for forward compatibility).
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMetadata {
    pub chat_id: String,
    #[serde(default)]
    pub chat_group_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// User message with transcription and prosody scores.
#[derive(Debug, Clone, Deserialize)]
pub struct UserMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub message: MessageContent,
    #[serde(default)]
    pub models: Option<ProsodyModels>,
    #[serde(default)]
    pub interim: Option<bool>,
}

impl UserMessage {
    /// Whitelisted prosody scores, or `None` when the message carried no
    /// prosody model output.
    pub fn prosody(&self) -> Option<EmotionVector> {
        let scores = self.models.as_ref()?.prosody.as_ref()?.scores.as_ref()?;
        Some(map_vendor_scores(
            scores
                .iter()
                .filter_map(|(name, value)| value.as_f64().map(|score| (name.as_str(), score))),
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProsodyModels {
    #[serde(default)]
    pub prosody: Option<ProsodyData>,
}

/// Raw prosody scores keyed by vendor emotion name.
///
/// Kept as a JSON map so vendor order survives into the emotion vector.
#[derive(Debug, Clone, Deserialize)]
pub struct ProsodyData {
    #[serde(default)]
    pub scores: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub message: MessageContent,
}

/// Audio output chunk from assistant.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioOutput {
    #[serde(default)]
    pub id: Option<String>,
    /// Base64-encoded audio data.
    pub data: String,
}

impl AudioOutput {
    pub fn decode_audio(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.data)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantEnd {
    #[serde(default)]
    pub id: Option<String>,
}

/// EVI error message.
#[derive(Debug, Clone, Deserialize)]
pub struct EVIError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

// =============================================================================
// Helper Functions
// =============================================================================

pub fn serialize_client_message(msg: &EVIClientMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

pub fn deserialize_server_message(json: &str) -> Result<EVIServerMessage, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_input_from_bytes() {
        let input = AudioInput::from_bytes(&[0u8, 1, 2, 3]);
        assert_eq!(BASE64.decode(&input.data).unwrap(), vec![0u8, 1, 2, 3]);
    }

    #[test]
    fn test_session_settings_serialization() {
        let msg = EVIClientMessage::SessionSettings(SessionSettings {
            system_prompt: Some("Be kind".into()),
            voice_id: None,
            language: Some("en".into()),
            audio: AudioSettings {
                encoding: AudioEncoding::Linear16,
                sample_rate: 44100,
                channels: 1,
            },
            timeouts: SessionTimeouts {
                inactivity: TimeoutSetting::seconds(120),
                max_duration: TimeoutSetting::seconds(0),
            },
        });
        let json: serde_json::Value =
            serde_json::from_str(&serialize_client_message(&msg).unwrap()).unwrap();
        assert_eq!(json["type"], "session_settings");
        assert_eq!(json["system_prompt"], "Be kind");
        assert!(json.get("voice_id").is_none());
        assert_eq!(json["audio"]["encoding"], "linear16");
        assert_eq!(json["timeouts"]["inactivity"]["duration_secs"], 120);
        assert_eq!(json["timeouts"]["max_duration"]["enabled"], false);
    }

    #[test]
    fn test_user_message_prosody_whitelist_and_order() {
        let json = r#"{
            "type": "user_message",
            "id": "m1",
            "message": {"role": "user", "content": "I feel fine"},
            "models": {"prosody": {"scores": {
                "Tiredness": 0.4, "Calmness": 0.6, "Vibes": 0.9, "joy": 0.2
            }}},
            "interim": false
        }"#;
        let EVIServerMessage::UserMessage(msg) = deserialize_server_message(json).unwrap() else {
            panic!("expected user message");
        };
        assert_eq!(msg.message.content, "I feel fine");
        let prosody = msg.prosody().unwrap();
        let names: Vec<&str> = prosody.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Tiredness", "Calmness", "Joy"]);
    }

    #[test]
    fn test_user_message_without_models() {
        let json = r#"{"type": "user_message", "message": {"role": "user", "content": "hi"}}"#;
        let EVIServerMessage::UserMessage(msg) = deserialize_server_message(json).unwrap() else {
            panic!("expected user message");
        };
        assert!(msg.prosody().is_none());
    }

    #[test]
    fn test_audio_output_decode() {
        let json = r#"{"type": "audio_output", "id": "a1", "data": "AAEC"}"#;
        let EVIServerMessage::AudioOutput(out) = deserialize_server_message(json).unwrap() else {
            panic!("expected audio output");
        };
        assert_eq!(out.decode_audio().unwrap(), vec![0u8, 1, 2]);
    }

    #[test]
    fn test_error_and_unknown() {
        let json = r#"{"type": "error", "code": "E0710", "message": "bad audio"}"#;
        assert!(matches!(
            deserialize_server_message(json).unwrap(),
            EVIServerMessage::Error(_)
        ));
        let json = r#"{"type": "tool_call", "name": "x"}"#;
        assert!(matches!(
            deserialize_server_message(json).unwrap(),
            EVIServerMessage::Unknown
        ));
    }

    #[test]
    fn test_session_status() {
        let json = r#"{"type": "session_status", "status": "ready"}"#;
        let EVIServerMessage::SessionStatus(status) = deserialize_server_message(json).unwrap()
        else {
            panic!("expected session status");
        };
        assert_eq!(status.status.as_deref(), Some("ready"));
    }
}
