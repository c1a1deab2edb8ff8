//! Merging YAML over the environment-derived configuration.

use std::path::PathBuf;

use super::ServerConfig;
use super::TlsConfig;
use super::env::load_from_env;
use super::yaml::{CheckinYaml, YamlConfig};

/// Overwrite `target` when the YAML provided a value.
fn overlay<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Like [`overlay`] for optional settings.
fn overlay_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

/// Build the final configuration: environment first, YAML on top.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        overlay(&mut config.host, server.host);
        overlay(&mut config.port, server.port);

        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(true) => {
                    let cert_path = tls
                        .cert_path
                        .ok_or("server.tls.enabled is true but cert_path is missing")?;
                    let key_path = tls
                        .key_path
                        .ok_or("server.tls.enabled is true but key_path is missing")?;
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert_path),
                        key_path: PathBuf::from(key_path),
                    });
                }
                Some(false) => config.tls = None,
                None => {}
            }
        }
    }

    if let Some(providers) = yaml.providers {
        overlay_opt(&mut config.hume_api_key, providers.hume_api_key);
        overlay(&mut config.hume_stream_url, providers.hume_stream_url);
        overlay(&mut config.hume_evi_url, providers.hume_evi_url);
        overlay_opt(&mut config.hume_evi_config_id, providers.hume_evi_config_id);
        overlay_opt(&mut config.gemini_api_key, providers.gemini_api_key);
        overlay(&mut config.gemini_model, providers.gemini_model);
        overlay(&mut config.gemini_base_url, providers.gemini_base_url);
    }

    if let Some(storage) = yaml.storage {
        overlay_opt(&mut config.storage_path, storage.path.map(PathBuf::from));
        overlay_opt(&mut config.storage_s3_bucket, storage.s3_bucket);
        overlay_opt(&mut config.storage_s3_region, storage.s3_region);
        overlay_opt(&mut config.storage_s3_endpoint, storage.s3_endpoint);
        overlay_opt(&mut config.storage_s3_access_key, storage.s3_access_key);
        overlay_opt(&mut config.storage_s3_secret_key, storage.s3_secret_key);
        overlay_opt(&mut config.storage_prefix, storage.prefix);
    }

    if let Some(checkin) = yaml.checkin {
        merge_checkin(&mut config, checkin);
    }

    if let Some(security) = yaml.security {
        overlay_opt(&mut config.cors_allowed_origins, security.cors_allowed_origins);
        overlay(
            &mut config.rate_limit_requests_per_second,
            security.rate_limit_requests_per_second,
        );
        overlay(&mut config.rate_limit_burst_size, security.rate_limit_burst_size);
    }

    Ok(config)
}

fn merge_checkin(config: &mut ServerConfig, yaml: CheckinYaml) {
    let checkin = &mut config.checkin;
    overlay(&mut checkin.duration_secs, yaml.duration_secs);
    overlay(&mut checkin.tick_ms, yaml.tick_ms);
    overlay(&mut checkin.capture_interval_ms, yaml.capture_interval_ms);
    overlay(&mut checkin.stream_window_ms, yaml.stream_window_ms);
    overlay(&mut checkin.audio_chunk_bytes, yaml.audio_chunk_bytes);
    overlay(&mut checkin.max_reconnects, yaml.max_reconnects);
    overlay(
        &mut checkin.reconnect_initial_delay_ms,
        yaml.reconnect_initial_delay_ms,
    );
    overlay(&mut checkin.connect_timeout_secs, yaml.connect_timeout_secs);
    overlay(&mut checkin.demo_interval_ms, yaml.demo_interval_ms);
    overlay_opt(&mut checkin.system_prompt, yaml.system_prompt);
    overlay_opt(&mut checkin.voice_id, yaml.voice_id);
    overlay_opt(&mut checkin.language, yaml.language);
    overlay(&mut checkin.max_duration_secs, yaml.max_duration_secs);
    overlay(
        &mut checkin.inactivity_timeout_secs,
        yaml.inactivity_timeout_secs,
    );
    overlay(&mut checkin.score_levels, yaml.score_levels);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::yaml::{ProvidersYaml, ServerYaml, StorageYaml, TlsYaml};
    use serial_test::serial;
    use std::env;

    fn clear() {
        unsafe {
            for key in ["HOST", "STORAGE_PATH", "TLS_ENABLED", "GEMINI_MODEL"] {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_merge_without_yaml_is_env() {
        clear();
        unsafe { env::set_var("GEMINI_MODEL", "gemini-env") };
        let config = merge_config(None).unwrap();
        assert_eq!(config.gemini_model, "gemini-env");
        clear();
    }

    #[test]
    #[serial]
    fn test_yaml_values_win() {
        clear();
        unsafe {
            env::set_var("HOST", "10.0.0.1");
            env::set_var("STORAGE_PATH", "/env/path");
        }
        let yaml = YamlConfig {
            server: Some(ServerYaml {
                host: Some("127.0.0.1".into()),
                ..Default::default()
            }),
            storage: Some(StorageYaml {
                prefix: Some("aura".into()),
                ..Default::default()
            }),
            providers: Some(ProvidersYaml::default()),
            ..Default::default()
        };

        let config = merge_config(Some(yaml)).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        // Unset YAML keys keep the env value
        assert_eq!(config.storage_path, Some(PathBuf::from("/env/path")));
        assert_eq!(config.storage_prefix.as_deref(), Some("aura"));
        clear();
    }

    #[test]
    #[serial]
    fn test_yaml_tls_requires_paths() {
        clear();
        let yaml = YamlConfig {
            server: Some(ServerYaml {
                tls: Some(TlsYaml {
                    enabled: Some(true),
                    cert_path: Some("/c.pem".into()),
                    key_path: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = merge_config(Some(yaml)).unwrap_err();
        assert!(err.to_string().contains("key_path"));
    }
}
