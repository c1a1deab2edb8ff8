//! Shared application state handed to every handler.

use std::sync::Arc;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::report::{GeminiClient, ReportGenerator};
use crate::core::session::{AdapterFactory, SessionOptions};
use crate::core::storage::{CheckinRepository, StorageError};

pub struct AppState {
    pub config: ServerConfig,
    pub repository: CheckinRepository,
    pub reports: ReportGenerator,
    /// Builds the vendor adapters for each WebSocket session
    pub adapters: Arc<dyn AdapterFactory>,
    pub options: SessionOptions,
}

impl AppState {
    /// Build state from configuration, opening the configured storage backend.
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>, StorageError> {
        let repository =
            CheckinRepository::open(&config.storage_backend(), config.storage_prefix.clone())?;

        let gemini = config.gemini_config().map(|gemini| {
            info!("Report narratives via Gemini model {}", gemini.model);
            GeminiClient::new(reqwest::Client::new(), gemini)
        });
        let reports = ReportGenerator::new(repository.clone(), gemini);

        if config.hume_api_key.is_none() {
            info!("HUME_API_KEY not set, check-ins will run on demo data");
        }

        let adapters: Arc<dyn AdapterFactory> = Arc::new(config.adapter_factory());
        let options = config.session_options();

        Ok(Arc::new(Self {
            config,
            repository,
            reports,
            adapters,
            options,
        }))
    }

    /// State with explicit parts, used by tests and embedders.
    pub fn with_parts(
        config: ServerConfig,
        repository: CheckinRepository,
        reports: ReportGenerator,
        adapters: Arc<dyn AdapterFactory>,
    ) -> Arc<Self> {
        let options = config.session_options();
        Arc::new(Self {
            config,
            repository,
            reports,
            adapters,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_state_uses_memory_and_template_reports() {
        let state = AppState::new(ServerConfig::default()).await.unwrap();
        assert!(!state.reports.uses_gemini());
        assert_eq!(state.options.levels, 5);
    }

    #[tokio::test]
    async fn test_gemini_enabled_with_key() {
        let mut config = ServerConfig::default();
        config.gemini_api_key = Some("g".into());
        let state = AppState::new(config).await.unwrap();
        assert!(state.reports.uses_gemini());
    }
}
