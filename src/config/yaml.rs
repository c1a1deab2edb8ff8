use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file take precedence over environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   tls:
///     enabled: true
///     cert_path: "/etc/aura/cert.pem"
///     key_path: "/etc/aura/key.pem"
///
/// providers:
///   hume_api_key: "your-hume-key"
///   hume_evi_config_id: "evi-config-id"
///   gemini_api_key: "your-gemini-key"
///   gemini_model: "gemini-1.5-flash"
///
/// storage:
///   path: "/var/lib/aura"
///   prefix: "aura/production"
///
/// checkin:
///   duration_secs: 60
///   capture_interval_ms: 500
///   max_reconnects: 3
///   system_prompt: "You are a warm check-in assistant."
///
/// security:
///   cors_allowed_origins: "https://clinic.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub storage: Option<StorageYaml>,
    pub checkin: Option<CheckinYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Vendor credentials and endpoints from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    /// Hume AI key for the expression stream and EVI
    pub hume_api_key: Option<String>,
    pub hume_stream_url: Option<String>,
    pub hume_evi_url: Option<String>,
    pub hume_evi_config_id: Option<String>,
    /// Gemini key for report narratives
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_base_url: Option<String>,
}

/// Check-in and report storage from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageYaml {
    pub path: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub prefix: Option<String>,
}

/// Check-in session timing from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CheckinYaml {
    pub duration_secs: Option<u64>,
    pub tick_ms: Option<u64>,
    pub capture_interval_ms: Option<u64>,
    pub stream_window_ms: Option<u32>,
    pub audio_chunk_bytes: Option<usize>,
    pub max_reconnects: Option<u32>,
    pub reconnect_initial_delay_ms: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub demo_interval_ms: Option<u64>,
    pub system_prompt: Option<String>,
    pub voice_id: Option<String>,
    pub language: Option<String>,
    pub max_duration_secs: Option<u64>,
    pub inactivity_timeout_secs: Option<u64>,
    pub score_levels: Option<u32>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
