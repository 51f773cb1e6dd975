use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path;
use shared_types::{StorageBackendKind, StorageResult};

use super::error::StorageError;

/// File content plus the MIME type it should be served with.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub data: Bytes,
    pub mime_type: String,
}

impl FileUpload {
    pub fn new(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn kind(&self) -> StorageBackendKind;

    async fn upload(&self, file: FileUpload, path: &str) -> Result<StorageResult, StorageError>;

    async fn download(&self, path: &str) -> Result<Bytes, StorageError>;

    /// Deleting a missing file is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// URL for reading the file. May be time-limited.
    async fn get_url(&self, path: &str) -> Result<String, StorageError>;

    /// Stable URL, falling back to [`StorageProvider::get_url`] when no public
    /// base is configured.
    async fn get_public_url(&self, path: &str) -> Result<String, StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;
}

/// Validate a caller-supplied relative path and convert it to a store path.
pub(crate) fn object_path(path: &str) -> Result<Path, StorageError> {
    let invalid = || StorageError::InvalidPath(path.to_string());
    if path.is_empty() || path.starts_with('/') {
        return Err(invalid());
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid());
    }
    Path::parse(path).map_err(|_| invalid())
}
