//! Check-in and report persistence on an [`ObjectStore`].
//!
//! Object layout under the optional prefix:
//!
//! - `checkins/{id}.json` - submitted check-ins
//! - `reports/{filename}` - generated reports

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{Error as ObjectStoreError, ObjectStore, PutPayload, path::Path as ObjectPath};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::session::{CheckinSink, CheckinSubmission};

const CHECKINS_DIR: &str = "checkins";
const REPORTS_DIR: &str = "reports";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    /// The backing store rejected or failed the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ObjectStoreError> for StorageError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::NotFound { path, .. } => StorageError::NotFound(path),
            other => StorageError::Unavailable(other.to_string()),
        }
    }
}

/// Where objects live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Local(PathBuf),
    S3 {
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    },
}

/// Names accepted for report downloads: a single path segment.
pub fn is_valid_object_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.starts_with('.')
}

fn build_object_key(prefix: Option<&str>, dir: &str, name: &str) -> String {
    match prefix
        .map(|p| p.trim().trim_matches('/'))
        .filter(|p| !p.is_empty())
    {
        Some(prefix) => format!("{prefix}/{dir}/{name}"),
        None => format!("{dir}/{name}"),
    }
}

#[derive(Clone)]
pub struct CheckinRepository {
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl std::fmt::Debug for CheckinRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckinRepository")
            .field("store", &self.store.to_string())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl CheckinRepository {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: Option<String>) -> Self {
        Self { store, prefix }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), None)
    }

    pub fn open(backend: &StorageBackend, prefix: Option<String>) -> Result<Self, StorageError> {
        let store: Arc<dyn ObjectStore> = match backend {
            StorageBackend::Memory => {
                info!("Using in-memory check-in storage");
                Arc::new(InMemory::new())
            }
            StorageBackend::Local(root) => {
                std::fs::create_dir_all(root).map_err(|e| {
                    StorageError::Unavailable(format!("cannot create {}: {e}", root.display()))
                })?;
                info!("Using filesystem check-in storage at {}", root.display());
                Arc::new(LocalFileSystem::new_with_prefix(root)?)
            }
            StorageBackend::S3 {
                bucket,
                region,
                endpoint,
                access_key_id,
                secret_access_key,
            } => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                if let Some(key) = access_key_id {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = secret_access_key {
                    builder = builder.with_secret_access_key(secret);
                }
                info!("Using S3 check-in storage in bucket {bucket}");
                Arc::new(builder.build()?)
            }
        };
        Ok(Self::new(store, prefix))
    }

    fn key(&self, dir: &str, name: &str) -> Result<ObjectPath, StorageError> {
        let key = build_object_key(self.prefix.as_deref(), dir, name);
        ObjectPath::parse(&key).map_err(|e| StorageError::InvalidName(e.to_string()))
    }

    /// Store a check-in under a fresh id and return the id.
    pub async fn save_checkin(&self, submission: &CheckinSubmission) -> Result<String, StorageError> {
        let id = Uuid::new_v4().to_string();
        let path = self.key(CHECKINS_DIR, &format!("{id}.json"))?;
        let body = serde_json::to_vec(submission)?;
        self.store.put(&path, PutPayload::from(body)).await?;
        info!(
            "Stored check-in {id} ({} readings)",
            submission.emotion_timeline.len()
        );
        Ok(id)
    }

    pub async fn load_checkin(&self, id: &str) -> Result<CheckinSubmission, StorageError> {
        if !is_valid_object_name(id) {
            return Err(StorageError::InvalidName(id.to_string()));
        }
        let path = self.key(CHECKINS_DIR, &format!("{id}.json"))?;
        let bytes = self.store.get(&path).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn save_report(&self, filename: &str, body: Bytes) -> Result<(), StorageError> {
        if !is_valid_object_name(filename) {
            return Err(StorageError::InvalidName(filename.to_string()));
        }
        let path = self.key(REPORTS_DIR, filename)?;
        debug!("Writing report {path} ({} bytes)", body.len());
        self.store.put(&path, PutPayload::from(body)).await?;
        Ok(())
    }

    pub async fn load_report(&self, filename: &str) -> Result<Bytes, StorageError> {
        if !is_valid_object_name(filename) {
            return Err(StorageError::InvalidName(filename.to_string()));
        }
        let path = self.key(REPORTS_DIR, filename)?;
        Ok(self.store.get(&path).await?.bytes().await?)
    }
}

#[async_trait]
impl CheckinSink for CheckinRepository {
    async fn submit(&self, submission: &CheckinSubmission) -> Result<String, StorageError> {
        self.save_checkin(submission).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::emotion::{EmotionSample, EmotionSource, TimestampedReading};

    fn submission() -> CheckinSubmission {
        CheckinSubmission::new(
            Some("p-1".into()),
            Some("Patient: fine".into()),
            vec![TimestampedReading::new(
                10,
                vec![EmotionSample::new("Calmness", 0.7)].into(),
                0.95,
                EmotionSource::Facial,
            )],
        )
    }

    #[test]
    fn test_build_object_key() {
        assert_eq!(build_object_key(None, "reports", "a.md"), "reports/a.md");
        assert_eq!(build_object_key(Some("aura/"), "reports", "a.md"), "aura/reports/a.md");
        assert_eq!(build_object_key(Some("  "), "checkins", "x.json"), "checkins/x.json");
    }

    #[test]
    fn test_object_name_validation() {
        assert!(is_valid_object_name("sentiment-report-p1-abcd1234.md"));
        assert!(!is_valid_object_name(""));
        assert!(!is_valid_object_name("../secrets"));
        assert!(!is_valid_object_name("a/b.md"));
        assert!(!is_valid_object_name(".hidden"));
    }

    #[tokio::test]
    async fn test_checkin_save_and_load() {
        let repo = CheckinRepository::in_memory();
        let original = submission();
        let id = repo.save_checkin(&original).await.unwrap();
        assert_eq!(repo.load_checkin(&id).await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_missing_report_is_not_found() {
        let repo = CheckinRepository::in_memory();
        assert!(matches!(
            repo.load_report("nope.md").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            repo.load_report("../nope.md").await,
            Err(StorageError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_local_filesystem_backend() {
        let dir = tempfile::tempdir().unwrap();
        let repo = CheckinRepository::open(
            &StorageBackend::Local(dir.path().join("data")),
            Some("aura".into()),
        )
        .unwrap();

        repo.save_report("r.md", Bytes::from_static(b"# Report"))
            .await
            .unwrap();
        assert!(dir.path().join("data/aura/reports/r.md").exists());
        assert_eq!(
            repo.load_report("r.md").await.unwrap(),
            Bytes::from_static(b"# Report")
        );
    }

    #[tokio::test]
    async fn test_sink_submits_to_repository() {
        let repo = CheckinRepository::in_memory();
        let sink: &dyn CheckinSink = &repo;
        let id = sink.submit(&submission()).await.unwrap();
        assert!(repo.load_checkin(&id).await.is_ok());
    }
}
