//! Configuration validation.

use super::ServerConfig;

/// Reject configurations the server cannot run with.
pub(super) fn validate_config(config: &ServerConfig) -> Result<(), String> {
    if config.port == 0 {
        return Err("port must be greater than 0".to_string());
    }

    let checkin = &config.checkin;
    let positive = [
        ("checkin.duration_secs", checkin.duration_secs),
        ("checkin.tick_ms", checkin.tick_ms),
        ("checkin.capture_interval_ms", checkin.capture_interval_ms),
        ("checkin.demo_interval_ms", checkin.demo_interval_ms),
        ("checkin.connect_timeout_secs", checkin.connect_timeout_secs),
        ("checkin.audio_chunk_bytes", checkin.audio_chunk_bytes as u64),
        ("checkin.score_levels", u64::from(checkin.score_levels)),
    ];
    for (name, value) in positive {
        if value == 0 {
            return Err(format!("{name} must be greater than 0"));
        }
    }
    if checkin.tick_ms > checkin.duration_secs.saturating_mul(1000) {
        return Err("checkin.tick_ms must not exceed the check-in duration".to_string());
    }

    if let Some(tls) = &config.tls {
        if tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty() {
            return Err("TLS requires both cert_path and key_path".to_string());
        }
    }

    if config.storage_s3_access_key.is_some() != config.storage_s3_secret_key.is_some() {
        return Err(
            "S3 storage requires both access key and secret key, or neither".to_string(),
        );
    }
    if config.storage_s3_bucket.is_none()
        && (config.storage_s3_region.is_some() || config.storage_s3_endpoint.is_some())
    {
        return Err("S3 region or endpoint set without a bucket".to_string());
    }

    if config.rate_limit_requests_per_second == 0 || config.rate_limit_burst_size == 0 {
        return Err("rate limit values must be greater than 0".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = ServerConfig::default();
        config.port = 0;
        assert!(validate_config(&config).unwrap_err().contains("port"));

        let mut config = ServerConfig::default();
        config.checkin.tick_ms = 0;
        assert!(validate_config(&config).unwrap_err().contains("tick_ms"));

        let mut config = ServerConfig::default();
        config.checkin.audio_chunk_bytes = 0;
        assert!(validate_config(&config).unwrap_err().contains("audio_chunk_bytes"));
    }

    #[test]
    fn test_tick_longer_than_duration_rejected() {
        let mut config = ServerConfig::default();
        config.checkin.duration_secs = 1;
        config.checkin.tick_ms = 2000;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_half_configured_s3_rejected() {
        let mut config = ServerConfig::default();
        config.storage_s3_bucket = Some("bucket".into());
        config.storage_s3_access_key = Some("key".into());
        assert!(validate_config(&config).unwrap_err().contains("secret key"));

        config.storage_s3_secret_key = Some("secret".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_tls_paths_rejected() {
        let mut config = ServerConfig::default();
        config.tls = Some(TlsConfig {
            cert_path: PathBuf::new(),
            key_path: PathBuf::from("/k.pem"),
        });
        assert!(validate_config(&config).is_err());
    }
}
