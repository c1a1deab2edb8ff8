//! Environment variable loading.
//!
//! Every setting has an upper-case variable. Unset or empty variables keep
//! the default; present but unparsable values are errors.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{CheckinSettings, ServerConfig, TlsConfig};

/// Read an optional string variable. Empty values count as unset.
pub(super) fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse an optional variable.
pub(super) fn env_parse<T>(key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {key}: {e}")),
        None => Ok(None),
    }
}

fn env_bool(key: &str) -> Result<Option<bool>, String> {
    match env_string(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(format!("Invalid boolean for {key}: {other}")),
        },
        None => Ok(None),
    }
}

/// Build a configuration from defaults overlaid with environment variables.
pub(super) fn load_from_env() -> Result<ServerConfig, String> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_string("HOST") {
        config.host = host;
    }
    if let Some(port) = env_parse("PORT")? {
        config.port = port;
    }

    if env_bool("TLS_ENABLED")?.unwrap_or(false) {
        let cert_path = env_string("TLS_CERT_PATH")
            .ok_or("TLS_ENABLED is set but TLS_CERT_PATH is missing")?;
        let key_path = env_string("TLS_KEY_PATH")
            .ok_or("TLS_ENABLED is set but TLS_KEY_PATH is missing")?;
        config.tls = Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        });
    }

    config.hume_api_key = env_string("HUME_API_KEY");
    if let Some(url) = env_string("HUME_STREAM_URL") {
        config.hume_stream_url = url;
    }
    if let Some(url) = env_string("HUME_EVI_URL") {
        config.hume_evi_url = url;
    }
    config.hume_evi_config_id = env_string("HUME_EVI_CONFIG_ID");

    config.gemini_api_key = env_string("GEMINI_API_KEY");
    if let Some(model) = env_string("GEMINI_MODEL") {
        config.gemini_model = model;
    }
    if let Some(url) = env_string("GEMINI_BASE_URL") {
        config.gemini_base_url = url;
    }

    config.storage_path = env_string("STORAGE_PATH").map(PathBuf::from);
    config.storage_s3_bucket = env_string("STORAGE_S3_BUCKET");
    config.storage_s3_region = env_string("STORAGE_S3_REGION");
    config.storage_s3_endpoint = env_string("STORAGE_S3_ENDPOINT");
    config.storage_s3_access_key = env_string("STORAGE_S3_ACCESS_KEY");
    config.storage_s3_secret_key = env_string("STORAGE_S3_SECRET_KEY");
    config.storage_prefix = env_string("STORAGE_PREFIX");

    load_checkin_settings(&mut config.checkin)?;

    config.cors_allowed_origins = env_string("CORS_ALLOWED_ORIGINS");
    if let Some(rps) = env_parse("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = env_parse("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }

    Ok(config)
}

fn load_checkin_settings(checkin: &mut CheckinSettings) -> Result<(), String> {
    if let Some(v) = env_parse("CHECKIN_DURATION_SECS")? {
        checkin.duration_secs = v;
    }
    if let Some(v) = env_parse("CHECKIN_TICK_MS")? {
        checkin.tick_ms = v;
    }
    if let Some(v) = env_parse("CAPTURE_INTERVAL_MS")? {
        checkin.capture_interval_ms = v;
    }
    if let Some(v) = env_parse("STREAM_WINDOW_MS")? {
        checkin.stream_window_ms = v;
    }
    if let Some(v) = env_parse("AUDIO_CHUNK_BYTES")? {
        checkin.audio_chunk_bytes = v;
    }
    if let Some(v) = env_parse("MAX_RECONNECTS")? {
        checkin.max_reconnects = v;
    }
    if let Some(v) = env_parse("RECONNECT_INITIAL_DELAY_MS")? {
        checkin.reconnect_initial_delay_ms = v;
    }
    if let Some(v) = env_parse("CONNECT_TIMEOUT_SECS")? {
        checkin.connect_timeout_secs = v;
    }
    if let Some(v) = env_parse("DEMO_INTERVAL_MS")? {
        checkin.demo_interval_ms = v;
    }
    checkin.system_prompt = env_string("EVI_SYSTEM_PROMPT");
    checkin.voice_id = env_string("EVI_VOICE_ID");
    checkin.language = env_string("EVI_LANGUAGE");
    if let Some(v) = env_parse("EVI_MAX_DURATION_SECS")? {
        checkin.max_duration_secs = v;
    }
    if let Some(v) = env_parse("EVI_INACTIVITY_TIMEOUT_SECS")? {
        checkin.inactivity_timeout_secs = v;
    }
    if let Some(v) = env_parse("SCORE_LEVELS")? {
        checkin.score_levels = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_parse() {
        unsafe {
            env::set_var("AURA_TEST_NUMBER", "42");
            env::set_var("AURA_TEST_BAD", "forty");
            env::set_var("AURA_TEST_EMPTY", "  ");
        }
        assert_eq!(env_parse::<u32>("AURA_TEST_NUMBER").unwrap(), Some(42));
        assert!(env_parse::<u32>("AURA_TEST_BAD").is_err());
        assert_eq!(env_parse::<u32>("AURA_TEST_EMPTY").unwrap(), None);
        assert_eq!(env_string("AURA_TEST_EMPTY"), None);
        unsafe {
            env::remove_var("AURA_TEST_NUMBER");
            env::remove_var("AURA_TEST_BAD");
            env::remove_var("AURA_TEST_EMPTY");
        }
    }

    #[test]
    #[serial]
    fn test_tls_requires_both_paths() {
        unsafe {
            env::set_var("TLS_ENABLED", "true");
            env::set_var("TLS_CERT_PATH", "/tmp/cert.pem");
            env::remove_var("TLS_KEY_PATH");
        }
        let err = load_from_env().unwrap_err();
        assert!(err.contains("TLS_KEY_PATH"));
        unsafe {
            env::remove_var("TLS_ENABLED");
            env::remove_var("TLS_CERT_PATH");
        }
    }

    #[test]
    #[serial]
    fn test_checkin_settings_from_env() {
        unsafe {
            env::set_var("CHECKIN_DURATION_SECS", "45");
            env::set_var("AUDIO_CHUNK_BYTES", "8192");
            env::set_var("EVI_LANGUAGE", "en");
        }
        let config = load_from_env().unwrap();
        assert_eq!(config.checkin.duration_secs, 45);
        assert_eq!(config.checkin.audio_chunk_bytes, 8192);
        assert_eq!(config.checkin.language.as_deref(), Some("en"));
        unsafe {
            env::remove_var("CHECKIN_DURATION_SECS");
            env::remove_var("AUDIO_CHUNK_BYTES");
            env::remove_var("EVI_LANGUAGE");
        }
    }
}
