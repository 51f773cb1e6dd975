//! Settings-driven storage facade.
//!
//! The active backend is derived from the current settings snapshot and is
//! rebuilt whenever the settings version moves, so rotating object storage
//! credentials through the admin API takes effect on the next request.

use bytes::Bytes;
use shared_types::{StorageBackendKind, StorageResult};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::{StorageOptions, StorageProviderConfig};
use super::error::StorageError;
use super::local::LocalBackend;
use super::object::ObjectStoreBackend;
use super::traits::{FileUpload, StorageProvider};
use crate::settings::{SettingsStore, VersionedConfig, VersionedSlot};

pub enum Backend {
    Local(LocalBackend),
    ObjectStore(ObjectStoreBackend),
}

impl Backend {
    pub fn provider(&self) -> &dyn StorageProvider {
        match self {
            Backend::Local(local) => local,
            Backend::ObjectStore(object) => object,
        }
    }
}

pub struct StorageService {
    settings: SettingsStore,
    options: StorageOptions,
    backend: VersionedSlot<Backend>,
}

impl StorageService {
    pub fn new(settings: SettingsStore, options: StorageOptions) -> Self {
        Self {
            settings,
            options,
            backend: VersionedSlot::new(),
        }
    }

    /// Backend for the current settings version.
    pub async fn backend(&self) -> Result<Arc<Backend>, StorageError> {
        // The tag comes from the same snapshot the backend is built from, so a
        // cold start is tagged with the version its load installed.
        let VersionedConfig { config, version } = self.settings.get_versioned().await;
        self.backend
            .get_or_rebuild(version, || async {
                self.build_backend(&StorageProviderConfig::resolve(&config, &self.options)?)
            })
            .await
    }

    fn build_backend(&self, config: &StorageProviderConfig) -> Result<Backend, StorageError> {
        match config {
            StorageProviderConfig::ObjectStore(credentials) => {
                match ObjectStoreBackend::from_credentials(credentials, &self.options) {
                    Ok(backend) => Ok(Backend::ObjectStore(backend)),
                    Err(e) if self.options.local_storage_viable => {
                        warn!(error = %e, "object storage unusable, falling back to local storage");
                        self.local_backend()
                    }
                    Err(e) => Err(StorageError::ObjectStoreRequired(e.to_string())),
                }
            }
            StorageProviderConfig::Local { .. } => self.local_backend(),
        }
    }

    fn local_backend(&self) -> Result<Backend, StorageError> {
        let backend = LocalBackend::new(&self.options.local_root, &self.options.local_url_prefix)?
            .with_public_base_url(self.options.local_public_base_url.clone());
        Ok(Backend::Local(backend))
    }

    pub async fn active_backend(&self) -> Result<StorageBackendKind, StorageError> {
        Ok(self.backend().await?.provider().kind())
    }

    pub async fn upload(&self, file: FileUpload, path: &str) -> Result<StorageResult, StorageError> {
        let backend = self.backend().await?;
        let result = backend.provider().upload(file, path).await?;
        info!(path, backend = %result.backend, "file uploaded");
        Ok(result)
    }

    pub async fn download(&self, path: &str) -> Result<Bytes, StorageError> {
        self.backend().await?.provider().download(path).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.backend().await?.provider().delete(path).await
    }

    pub async fn get_url(&self, path: &str) -> Result<String, StorageError> {
        self.backend().await?.provider().get_url(path).await
    }

    pub async fn get_public_url(&self, path: &str) -> Result<String, StorageError> {
        self.backend().await?.provider().get_public_url(path).await
    }

    /// Any failure, including an unusable backend, reads as absent.
    pub async fn exists(&self, path: &str) -> bool {
        let backend = match self.backend().await {
            Ok(backend) => backend,
            Err(e) => {
                warn!(path, error = %e, "storage unavailable for existence check");
                return false;
            }
        };
        match backend.provider().exists(path).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(path, error = %e, "existence check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::settings::testing::ScriptedSource;
    use crate::settings::{
        CredentialSource, EnvCredentialSource, SettingsLoader, SettingsStoreConfig,
    };
    use std::time::Duration;
    use tempfile::TempDir;

    fn settings(source: &Arc<ScriptedSource>) -> SettingsStore {
        let admin: Arc<dyn CredentialSource> = source.clone();
        let loader = SettingsLoader::new(admin, EnvCredentialSource::default())
            .with_retry(RetryPolicy::new(1, Duration::from_millis(1)));
        SettingsStore::new(loader, SettingsStoreConfig::default())
    }

    fn options(dir: &TempDir, local_storage_viable: bool) -> StorageOptions {
        StorageOptions {
            local_root: dir.path().join("uploads"),
            local_storage_viable,
            ..StorageOptions::default()
        }
    }

    fn r2(account: &str) -> [(&str, &str); 4] {
        [
            ("r2_account_id", account),
            ("r2_access_key_id", "AKID"),
            ("r2_secret_access_key", "secret"),
            ("r2_bucket_name", "media"),
        ]
    }

    #[tokio::test]
    async fn test_credential_change_rebuilds_client() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::with_values(r2("acct-one")));
        let settings = settings(&source);
        let service = StorageService::new(settings.clone(), options(&dir, true));

        let first = service.get_url("a.png").await.unwrap();
        assert!(first.contains("acct-one.r2.cloudflarestorage.com"));
        let same = service.get_url("a.png").await.unwrap();
        assert!(same.contains("acct-one"));
        assert_eq!(source.rounds(), 1);

        source.set_values(r2("acct-two"));
        settings.clear();

        let second = service.get_url("a.png").await.unwrap();
        assert!(second.contains("acct-two.r2.cloudflarestorage.com"));
        assert_eq!(service.active_backend().await.unwrap(), StorageBackendKind::ObjectStore);
    }

    #[tokio::test]
    async fn test_cold_start_backend_is_reused() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::with_values(r2("acct-one")));
        let settings = settings(&source);
        let service = StorageService::new(settings.clone(), options(&dir, true));

        let first = service.backend().await.unwrap();
        assert_eq!(settings.get_config_version(), 1);
        assert_eq!(service.backend.current_version().await, Some(1));

        let second = service.backend().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.rounds(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_credentials_use_local_storage() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::with_values([("r2_account_id", "acct")]));
        let service = StorageService::new(settings(&source), options(&dir, true));

        let result = service
            .upload(FileUpload::new("hi", "text/plain"), "notes/hi.txt")
            .await
            .unwrap();
        assert_eq!(result.backend, StorageBackendKind::Local);
        assert_eq!(result.url.as_deref(), Some("/uploads/notes/hi.txt"));
        assert!(service.exists("notes/hi.txt").await);
        assert_eq!(service.download("notes/hi.txt").await.unwrap(), Bytes::from("hi"));
    }

    #[tokio::test]
    async fn test_required_object_store_is_reported() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(ScriptedSource::default());
        let service = StorageService::new(settings(&source), options(&dir, false));

        let err = service
            .upload(FileUpload::new("x", "text/plain"), "x.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ObjectStoreRequired(_)));
        assert!(!service.exists("x.txt").await);
        assert!(!dir.path().join("uploads").exists());
    }
}
