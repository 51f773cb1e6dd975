use async_trait::async_trait;
use chrono::{DateTime, Utc};
use object_store::aws::{AmazonS3Builder, S3ConditionalPut};
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload, RetryConfig};
use serde::{Deserialize, Serialize};
use shared_types::{SettingsCategory, VersionInfo};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::source::{CredentialSource, SourceError};

/// Where administrator-managed settings are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RepositoryConfig {
    Local {
        path: PathBuf,
    },
    S3 {
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        allow_http: bool,
    },
}

impl RepositoryConfig {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Settings not found: {0}")]
    NotFound(String),

    #[error("Settings already exist: {0}")]
    AlreadyExists(String),

    #[error("Version conflict: expected {expected}, but found {actual}")]
    VersionConflict { expected: String, actual: String },

    #[error("Unknown setting {key} for category {category}")]
    UnknownKey {
        category: SettingsCategory,
        key: String,
    },

    #[error("Settings store error: {0}")]
    Store(#[from] object_store::Error),

    #[error("Settings serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RepositoryError> for SourceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Store(object_store::Error::Generic { store, source }) => {
                SourceError::Unavailable(format!("{store}: {source}"))
            }
            RepositoryError::Serialization(e) => SourceError::Malformed(e.to_string()),
            RepositoryError::Io(e) => SourceError::Unavailable(e.to_string()),
            other => SourceError::Backend(other.to_string()),
        }
    }
}

/// Current values of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySettings {
    pub values: HashMap<String, String>,
    /// `None` when the category has never been written.
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CategoryHistory {
    current_version: String,
    entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryEntry {
    version: String,
    timestamp: DateTime<Utc>,
    key_count: usize,
}

impl CategoryHistory {
    fn record(&mut self, key_count: usize) -> String {
        let next = self
            .entries
            .iter()
            .filter_map(|e| e.version.strip_prefix('v')?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let version = format!("v{next}");
        self.entries.push(HistoryEntry {
            version: version.clone(),
            timestamp: Utc::now(),
            key_count,
        });
        self.current_version.clone_from(&version);
        version
    }
}

/// Administrator-managed settings, one versioned JSON document per category.
///
/// Layout: `admin/<category>/history.json` and
/// `admin/<category>/versions/<vN>/values.json`.
pub struct SettingsRepository {
    store: Arc<dyn ObjectStore>,
}

impl SettingsRepository {
    pub fn from_config(config: RepositoryConfig) -> Result<Self, RepositoryError> {
        let store: Arc<dyn ObjectStore> = match config {
            RepositoryConfig::Local { path } => {
                std::fs::create_dir_all(&path)?;
                info!("Admin settings stored under {}", path.display());
                Arc::new(LocalFileSystem::new_with_prefix(path)?)
            }
            RepositoryConfig::S3 {
                bucket,
                region,
                endpoint,
                access_key_id,
                secret_access_key,
                allow_http,
            } => {
                // Retries belong to the settings loader; create-only puts back
                // the version check in `put_category`.
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&bucket)
                    .with_allow_http(allow_http)
                    .with_retry(RetryConfig {
                        max_retries: 0,
                        ..RetryConfig::default()
                    })
                    .with_conditional_put(S3ConditionalPut::ETagMatch);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let Some(key) = access_key_id {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = secret_access_key {
                    builder = builder.with_secret_access_key(secret);
                }
                info!("Admin settings stored in bucket {}", bucket);
                Arc::new(builder.build()?)
            }
        };
        Ok(Self { store })
    }

    pub fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn history_path(category: SettingsCategory) -> Path {
        Path::from(format!("admin/{category}/history.json"))
    }

    fn values_path(category: SettingsCategory, version: &str) -> Path {
        Path::from(format!("admin/{category}/versions/{version}/values.json"))
    }

    async fn read_history(
        &self,
        category: SettingsCategory,
    ) -> Result<Option<CategoryHistory>, RepositoryError> {
        match self.store.get(&Self::history_path(category)).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_history(
        &self,
        category: SettingsCategory,
        history: &CategoryHistory,
    ) -> Result<(), RepositoryError> {
        let json = serde_json::to_vec_pretty(history)?;
        self.store
            .put(&Self::history_path(category), PutPayload::from(json))
            .await?;
        Ok(())
    }

    async fn read_values(
        &self,
        category: SettingsCategory,
        version: &str,
    ) -> Result<HashMap<String, String>, RepositoryError> {
        match self.store.get(&Self::values_path(category, version)).await {
            Ok(result) => Ok(serde_json::from_slice(&result.bytes().await?)?),
            Err(object_store::Error::NotFound { .. }) => Err(RepositoryError::NotFound(format!(
                "{category} @ {version}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Current values; a category that was never written is empty.
    #[instrument(skip(self))]
    pub async fn get_category(
        &self,
        category: SettingsCategory,
    ) -> Result<CategorySettings, RepositoryError> {
        let Some(history) = self.read_history(category).await? else {
            debug!("No admin settings stored for {}", category);
            return Ok(CategorySettings::default());
        };
        let values = self.read_values(category, &history.current_version).await?;
        Ok(CategorySettings {
            values,
            version: Some(history.current_version),
        })
    }

    /// Replace a category's values with optimistic concurrency control.
    ///
    /// `expected_version` must be `None` for the first write and the current
    /// version for every later one. Returns the new version.
    #[instrument(skip(self, values))]
    pub async fn put_category(
        &self,
        category: SettingsCategory,
        values: HashMap<String, String>,
        expected_version: Option<&str>,
    ) -> Result<String, RepositoryError> {
        if let Some(key) = values.keys().find(|k| !category.keys().contains(&k.as_str())) {
            return Err(RepositoryError::UnknownKey {
                category,
                key: key.clone(),
            });
        }

        let existing = self.read_history(category).await?;
        match (&existing, expected_version) {
            (None, None) => {}
            (Some(h), Some(expected)) if h.current_version == expected => {}
            (None, Some(expected)) => {
                return Err(RepositoryError::VersionConflict {
                    expected: expected.to_string(),
                    actual: "none".to_string(),
                });
            }
            (Some(_), None) => {
                return Err(RepositoryError::AlreadyExists(format!(
                    "{category} already has stored settings. Use expected_version to update."
                )));
            }
            (Some(h), Some(expected)) => {
                return Err(RepositoryError::VersionConflict {
                    expected: expected.to_string(),
                    actual: h.current_version.clone(),
                });
            }
        }

        let mut history = existing.unwrap_or_default();
        let version = history.record(values.len());

        // A concurrent writer that passed the same check races for the same
        // version; only one create can succeed.
        let json = serde_json::to_vec_pretty(&values)?;
        let create = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        match self
            .store
            .put_opts(&Self::values_path(category, &version), PutPayload::from(json), create)
            .await
        {
            Ok(_) => {}
            Err(object_store::Error::AlreadyExists { .. }) => {
                return Err(RepositoryError::VersionConflict {
                    expected: expected_version.unwrap_or("none").to_string(),
                    actual: version,
                });
            }
            Err(e) => return Err(e.into()),
        }
        self.write_history(category, &history).await?;

        info!("Stored {} settings as {}", category, version);
        Ok(version)
    }

    pub async fn get_category_version(
        &self,
        category: SettingsCategory,
        version: &str,
    ) -> Result<HashMap<String, String>, RepositoryError> {
        self.read_values(category, version).await
    }

    pub async fn list_versions(
        &self,
        category: SettingsCategory,
    ) -> Result<Vec<VersionInfo>, RepositoryError> {
        let history = self
            .read_history(category)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(category.to_string()))?;

        Ok(history
            .entries
            .into_iter()
            .map(|e| VersionInfo {
                version: e.version,
                timestamp: e.timestamp,
            })
            .collect())
    }

    /// Remove every stored version of a category.
    pub async fn delete_category(&self, category: SettingsCategory) -> Result<(), RepositoryError> {
        let history = self
            .read_history(category)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(category.to_string()))?;

        for entry in &history.entries {
            match self
                .store
                .delete(&Self::values_path(category, &entry.version))
                .await
            {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.store.delete(&Self::history_path(category)).await?;

        info!("Deleted stored settings for {}", category);
        Ok(())
    }
}

#[async_trait]
impl CredentialSource for SettingsRepository {
    async fn get_settings_by_category(
        &self,
        category: SettingsCategory,
    ) -> Result<HashMap<String, String>, SourceError> {
        Ok(self.get_category(category).await?.values)
    }
}
