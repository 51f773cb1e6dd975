use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::{ObjectStore, PutPayload};
use shared_types::{StorageBackendKind, StorageResult};
use std::path::Path as FsPath;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::StorageError;
use super::traits::{object_path, FileUpload, StorageProvider};

/// Files under a directory on the local filesystem, served by this process
/// under a fixed URL prefix.
pub struct LocalBackend {
    store: Arc<dyn ObjectStore>,
    url_prefix: String,
    public_base_url: Option<String>,
}

impl LocalBackend {
    pub fn new(root: &FsPath, url_prefix: &str) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| StorageError::from_store("open", &root.display().to_string(), &e))?;
        info!(root = %root.display(), "using local file storage");

        Ok(Self {
            store: Arc::new(store),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
            public_base_url: None,
        })
    }

    /// Absolute origin (e.g. `https://app.example.com`) prepended to public URLs.
    pub fn with_public_base_url(mut self, base: Option<String>) -> Self {
        self.public_base_url = base
            .map(|b| b.trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty());
        self
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.url_prefix, path)
    }
}

#[async_trait]
impl StorageProvider for LocalBackend {
    fn kind(&self) -> StorageBackendKind {
        StorageBackendKind::Local
    }

    async fn upload(&self, file: FileUpload, path: &str) -> Result<StorageResult, StorageError> {
        let location = object_path(path)?;
        let size = file.data.len();
        self.store
            .put(&location, PutPayload::from(file.data))
            .await
            .map_err(|e| StorageError::from_store("upload", path, &e))?;
        debug!(path, size, mime_type = %file.mime_type, "stored file locally");

        Ok(StorageResult {
            path: path.to_string(),
            url: Some(self.url_for(path)),
            backend: StorageBackendKind::Local,
        })
    }

    async fn download(&self, path: &str) -> Result<Bytes, StorageError> {
        let location = object_path(path)?;
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| StorageError::from_store("download", path, &e))?;
        result
            .bytes()
            .await
            .map_err(|e| StorageError::from_store("download", path, &e))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let location = object_path(path)?;
        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::from_store("delete", path, &e)),
        }
    }

    async fn get_url(&self, path: &str) -> Result<String, StorageError> {
        object_path(path)?;
        Ok(self.url_for(path))
    }

    async fn get_public_url(&self, path: &str) -> Result<String, StorageError> {
        let url = self.get_url(path).await?;
        Ok(match &self.public_base_url {
            Some(base) => format!("{base}{url}"),
            None => url,
        })
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let location = object_path(path)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::from_store("exists", path, &e)),
        }
    }
}
