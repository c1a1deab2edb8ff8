//! Configuration module for the Aura check-in server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use aura_checkin::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::emotion::{DEFAULT_LEVELS, StabilityConfig};
use crate::core::ingress::facial::HUME_STREAM_WEBSOCKET_URL;
use crate::core::ingress::vocal::HUME_EVI_WEBSOCKET_URL;
use crate::core::ingress::{FacialConfig, ReconnectPolicy, VocalConfig};
use crate::core::report::{GEMINI_DEFAULT_BASE_URL, GEMINI_DEFAULT_MODEL, GeminiConfig};
use crate::core::session::{SessionOptions, VendorAdapterFactory};
use crate::core::storage::StorageBackend;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Timing and vendor-session knobs for check-ins.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckinSettings {
    /// Default: 60
    pub duration_secs: u64,
    /// Countdown tick. Default: 1000
    pub tick_ms: u64,
    /// How often the newest camera frame is sent. Default: 500
    pub capture_interval_ms: u64,
    /// Default: 5000
    pub stream_window_ms: u32,
    /// Default: 4096
    pub audio_chunk_bytes: usize,
    /// Reconnects after the first failure. Default: 3
    pub max_reconnects: u32,
    /// Default: 500
    pub reconnect_initial_delay_ms: u64,
    /// Vendor socket handshake timeout. Default: 10
    pub connect_timeout_secs: u64,
    /// Demo data cadence. Default: 1000
    pub demo_interval_ms: u64,
    pub system_prompt: Option<String>,
    pub voice_id: Option<String>,
    pub language: Option<String>,
    /// EVI session cap. Default: 1800
    pub max_duration_secs: u64,
    /// Default: 120
    pub inactivity_timeout_secs: u64,
    /// Indicator levels for the overlay. Default: 5
    pub score_levels: u32,
}

impl Default for CheckinSettings {
    fn default() -> Self {
        Self {
            duration_secs: 60,
            tick_ms: 1000,
            capture_interval_ms: 500,
            stream_window_ms: 5000,
            audio_chunk_bytes: 4096,
            max_reconnects: 3,
            reconnect_initial_delay_ms: 500,
            connect_timeout_secs: 10,
            demo_interval_ms: 1000,
            system_prompt: None,
            voice_id: None,
            language: None,
            max_duration_secs: 1800,
            inactivity_timeout_secs: 120,
            score_levels: DEFAULT_LEVELS,
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the check-in server, including:
/// - Server settings (host, port, TLS)
/// - Hume and Gemini credentials and endpoints
/// - Check-in and report storage (filesystem, S3 or memory)
/// - Check-in session timing
/// - Security settings (CORS, rate limiting)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Hume AI
    /// Used for both the face stream and EVI
    pub hume_api_key: Option<String>,
    pub hume_stream_url: String,
    pub hume_evi_url: String,
    /// EVI configuration created in the Hume dashboard
    pub hume_evi_config_id: Option<String>,

    // Gemini report narratives
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,

    // Storage
    /// Local directory for check-ins and reports
    pub storage_path: Option<PathBuf>,
    pub storage_s3_bucket: Option<String>,
    pub storage_s3_region: Option<String>,
    pub storage_s3_endpoint: Option<String>,
    pub storage_s3_access_key: Option<String>,
    pub storage_s3_secret_key: Option<String>,
    /// Optional object key prefix, e.g. `aura/production`
    pub storage_prefix: Option<String>,

    pub checkin: CheckinSettings,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tls: None,
            hume_api_key: None,
            hume_stream_url: HUME_STREAM_WEBSOCKET_URL.to_string(),
            hume_evi_url: HUME_EVI_WEBSOCKET_URL.to_string(),
            hume_evi_config_id: None,
            gemini_api_key: None,
            gemini_model: GEMINI_DEFAULT_MODEL.to_string(),
            gemini_base_url: GEMINI_DEFAULT_BASE_URL.to_string(),
            storage_path: None,
            storage_s3_bucket: None,
            storage_s3_region: None,
            storage_s3_endpoint: None,
            storage_s3_access_key: None,
            storage_s3_secret_key: None,
            storage_prefix: None,
            checkin: CheckinSettings::default(),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
        }
    }
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.hume_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.storage_s3_access_key {
            key.zeroize();
        }
        if let Some(ref mut secret) = self.storage_s3_secret_key {
            secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only.
    ///
    /// The .env file is loaded in main.rs before this is called, so its values
    /// are visible here as ordinary environment variables.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Storage backend selection: S3 when a bucket is set, else the local
    /// path, else memory.
    pub fn storage_backend(&self) -> StorageBackend {
        if let Some(bucket) = &self.storage_s3_bucket {
            return StorageBackend::S3 {
                bucket: bucket.clone(),
                region: self.storage_s3_region.clone(),
                endpoint: self.storage_s3_endpoint.clone(),
                access_key_id: self.storage_s3_access_key.clone(),
                secret_access_key: self.storage_s3_secret_key.clone(),
            };
        }
        match &self.storage_path {
            Some(path) => StorageBackend::Local(path.clone()),
            None => StorageBackend::Memory,
        }
    }

    fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_reconnects: self.checkin.max_reconnects,
            initial_delay_ms: self.checkin.reconnect_initial_delay_ms,
            ..Default::default()
        }
    }

    pub fn facial_config(&self) -> FacialConfig {
        FacialConfig {
            api_key: self.hume_api_key.clone(),
            websocket_url: self.hume_stream_url.clone(),
            capture_interval_ms: self.checkin.capture_interval_ms,
            stream_window_ms: self.checkin.stream_window_ms,
            connection_timeout_seconds: self.checkin.connect_timeout_secs,
            reconnect: self.reconnect_policy(),
        }
    }

    pub fn vocal_config(&self) -> VocalConfig {
        VocalConfig {
            api_key: self.hume_api_key.clone(),
            config_id: self.hume_evi_config_id.clone(),
            system_prompt: self.checkin.system_prompt.clone(),
            voice_id: self.checkin.voice_id.clone(),
            language: self.checkin.language.clone(),
            max_duration_secs: self.checkin.max_duration_secs,
            inactivity_timeout_secs: self.checkin.inactivity_timeout_secs,
            audio_chunk_bytes: self.checkin.audio_chunk_bytes,
            websocket_url: self.hume_evi_url.clone(),
            connection_timeout_seconds: self.checkin.connect_timeout_secs,
            reconnect: self.reconnect_policy(),
            ..Default::default()
        }
    }

    pub fn adapter_factory(&self) -> VendorAdapterFactory {
        VendorAdapterFactory {
            facial: self.facial_config(),
            vocal: self.vocal_config(),
            demo_interval: Duration::from_millis(self.checkin.demo_interval_ms),
        }
    }

    /// Gemini settings, or `None` when no API key is configured.
    pub fn gemini_config(&self) -> Option<GeminiConfig> {
        let key = self.gemini_api_key.as_deref().filter(|k| !k.trim().is_empty())?;
        Some(GeminiConfig {
            api_key: key.to_string(),
            model: self.gemini_model.clone(),
            base_url: self.gemini_base_url.clone(),
        })
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            duration: Duration::from_secs(self.checkin.duration_secs),
            tick: Duration::from_millis(self.checkin.tick_ms),
            levels: self.checkin.score_levels,
            stability: StabilityConfig::default(),
        }
    }
}
