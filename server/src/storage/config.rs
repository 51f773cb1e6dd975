use shared_types::CachedConfig;
use std::fmt;
use std::path::PathBuf;

use super::error::StorageError;
use crate::retry::RetryPolicy;

/// S3-compatible (R2) credentials taken from settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectStoreCredentials {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub public_url: Option<String>,
}

impl ObjectStoreCredentials {
    /// Credentials are usable only when every required field is non-blank.
    pub fn from_config(config: &CachedConfig) -> Option<Self> {
        let required = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        Some(Self {
            account_id: required(&config.r2_account_id)?,
            access_key_id: required(&config.r2_access_key_id)?,
            secret_access_key: required(&config.r2_secret_access_key)?,
            bucket_name: required(&config.r2_bucket_name)?,
            public_url: required(&config.r2_public_url)
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

impl fmt::Debug for ObjectStoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreCredentials")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .field("public_url", &self.public_url)
            .finish()
    }
}

/// Deployment-level storage knobs that do not come from admin settings.
#[derive(Debug, Clone)]
pub struct StorageOptions {
    pub local_root: PathBuf,
    /// Prefix of the stable URLs handed out for local files.
    pub local_url_prefix: String,
    pub local_public_base_url: Option<String>,
    /// False on runtimes without a durable writable filesystem; object storage
    /// then becomes mandatory.
    pub local_storage_viable: bool,
    pub endpoint_override: Option<String>,
    pub allow_http: bool,
    pub retry: RetryPolicy,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            local_root: PathBuf::from("./data/uploads"),
            local_url_prefix: "/uploads".to_string(),
            local_public_base_url: None,
            local_storage_viable: true,
            endpoint_override: None,
            allow_http: false,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProviderConfig {
    Local { root: PathBuf, url_prefix: String },
    ObjectStore(ObjectStoreCredentials),
}

impl StorageProviderConfig {
    pub fn resolve(config: &CachedConfig, options: &StorageOptions) -> Result<Self, StorageError> {
        if let Some(credentials) = ObjectStoreCredentials::from_config(config) {
            return Ok(Self::ObjectStore(credentials));
        }
        if options.local_storage_viable {
            return Ok(Self::local(options));
        }
        Err(StorageError::ObjectStoreRequired(
            "object storage credentials are incomplete and local storage is disabled".to_string(),
        ))
    }

    pub fn local(options: &StorageOptions) -> Self {
        Self::Local {
            root: options.local_root.clone(),
            url_prefix: options.local_url_prefix.clone(),
        }
    }
}
