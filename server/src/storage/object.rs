use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, PutOptions, PutPayload, RetryConfig,
};
use shared_types::{StorageBackendKind, StorageResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::config::{ObjectStoreCredentials, StorageOptions};
use super::error::StorageError;
use super::traits::{object_path, FileUpload, StorageProvider};
use crate::retry::RetryPolicy;

/// Lifetime of presigned download URLs.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// S3-compatible bucket (Cloudflare R2 by default).
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    signer: Arc<dyn Signer>,
    bucket: String,
    public_url: Option<String>,
    retry: RetryPolicy,
}

impl ObjectStoreBackend {
    pub fn from_credentials(
        credentials: &ObjectStoreCredentials,
        options: &StorageOptions,
    ) -> Result<Self, StorageError> {
        let endpoint = options
            .endpoint_override
            .clone()
            .unwrap_or_else(|| credentials.endpoint());

        // `options.retry` is the only retry layer.
        let s3 = AmazonS3Builder::new()
            .with_bucket_name(&credentials.bucket_name)
            .with_region("auto")
            .with_endpoint(&endpoint)
            .with_access_key_id(&credentials.access_key_id)
            .with_secret_access_key(&credentials.secret_access_key)
            .with_allow_http(options.allow_http)
            .with_retry(RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            })
            .build()
            .map_err(|e| StorageError::from_store("connect", &credentials.bucket_name, &e))?;
        info!(bucket = %credentials.bucket_name, %endpoint, "using object storage");

        let s3 = Arc::new(s3);
        Ok(Self::with_parts(
            s3.clone(),
            s3,
            credentials.bucket_name.clone(),
            credentials.public_url.clone(),
            options.retry,
        ))
    }

    /// Assemble a backend from an arbitrary store and URL signer.
    pub fn with_parts(
        store: Arc<dyn ObjectStore>,
        signer: Arc<dyn Signer>,
        bucket: String,
        public_url: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            signer,
            bucket,
            public_url,
            retry,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn sign(&self, path: &str, location: &Path) -> Result<String, StorageError> {
        let url = self
            .signer
            .signed_url(http::Method::GET, location, SIGNED_URL_TTL)
            .await
            .map_err(|e| StorageError::from_store("sign", path, &e))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl StorageProvider for ObjectStoreBackend {
    fn kind(&self) -> StorageBackendKind {
        StorageBackendKind::ObjectStore
    }

    async fn upload(&self, file: FileUpload, path: &str) -> Result<StorageResult, StorageError> {
        let location = object_path(path)?;
        let size = file.data.len();
        let payload = PutPayload::from(file.data);
        let attributes = Attributes::from_iter([(
            Attribute::ContentType,
            AttributeValue::from(file.mime_type.clone()),
        )]);

        let store = &self.store;
        let location_ref = &location;
        self.retry
            .run("object upload", || {
                let payload = payload.clone();
                let opts = PutOptions {
                    attributes: attributes.clone(),
                    ..Default::default()
                };
                async move {
                    store
                        .put_opts(location_ref, payload, opts)
                        .await
                        .map_err(|e| StorageError::from_store("upload", path, &e))
                }
            })
            .await?;
        debug!(bucket = %self.bucket, path, size, mime_type = %file.mime_type, "uploaded object");

        let url = match self.get_public_url(path).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(path, error = %e, "uploaded object but could not produce a URL");
                None
            }
        };

        Ok(StorageResult {
            path: path.to_string(),
            url,
            backend: StorageBackendKind::ObjectStore,
        })
    }

    async fn download(&self, path: &str) -> Result<Bytes, StorageError> {
        let location = object_path(path)?;
        let store = &self.store;
        let location = &location;
        self.retry
            .run("object download", || async move {
                let result = store
                    .get(location)
                    .await
                    .map_err(|e| StorageError::from_store("download", path, &e))?;
                result
                    .bytes()
                    .await
                    .map_err(|e| StorageError::from_store("download", path, &e))
            })
            .await
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let location = object_path(path)?;
        let store = &self.store;
        let location = &location;
        self.retry
            .run("object delete", || async move {
                match store.delete(location).await {
                    Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
                    Err(e) => Err(StorageError::from_store("delete", path, &e)),
                }
            })
            .await
    }

    async fn get_url(&self, path: &str) -> Result<String, StorageError> {
        let location = object_path(path)?;
        let location = &location;
        self.retry
            .run("object sign", || self.sign(path, location))
            .await
    }

    async fn get_public_url(&self, path: &str) -> Result<String, StorageError> {
        match &self.public_url {
            Some(base) => {
                object_path(path)?;
                Ok(format!("{base}/{path}"))
            }
            None => self.get_url(path).await,
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let location = object_path(path)?;
        let store = &self.store;
        let location = &location;
        self.retry
            .run("object exists", || async move {
                match store.head(location).await {
                    Ok(_) => Ok(true),
                    Err(object_store::Error::NotFound { .. }) => Ok(false),
                    Err(e) => Err(StorageError::from_store("exists", path, &e)),
                }
            })
            .await
    }
}
