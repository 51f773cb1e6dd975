use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::settings::{RepositoryConfig, SettingsStoreConfig, DEFAULT_FETCH_TIMEOUT};
use crate::storage::StorageOptions;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    pub repository: RepositoryConfig,
    pub cache: SettingsStoreConfig,
    pub fetch_timeout: Duration,
    pub retry: RetryPolicy,
    pub storage: StorageOptions,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_address = var("BIND_ADDRESS")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDRESS must be a socket address")?;

        let backend = var("SETTINGS_BACKEND").unwrap_or_else(|| "local".to_string());
        let repository = match backend.as_str() {
            "local" => RepositoryConfig::local(
                var("SETTINGS_PATH").unwrap_or_else(|| "./data/settings".to_string()),
            ),
            "s3" => RepositoryConfig::S3 {
                bucket: var("SETTINGS_S3_BUCKET").ok_or_else(|| {
                    anyhow::anyhow!("SETTINGS_S3_BUCKET is required for the s3 settings backend")
                })?,
                region: var("SETTINGS_S3_REGION"),
                endpoint: var("SETTINGS_S3_ENDPOINT"),
                access_key_id: var("SETTINGS_S3_ACCESS_KEY_ID"),
                secret_access_key: var("SETTINGS_S3_SECRET_ACCESS_KEY"),
                allow_http: parse_or(&var, "SETTINGS_S3_ALLOW_HTTP", false)?,
            },
            other => anyhow::bail!(
                "Unknown settings backend: {}. Must be 'local' or 's3'",
                other
            ),
        };

        let defaults = SettingsStoreConfig::default();
        let cache = SettingsStoreConfig {
            ttl: secs_or(&var, "SETTINGS_CACHE_TTL_SECS", defaults.ttl)?,
            failure_cooldown: secs_or(
                &var,
                "SETTINGS_FAILURE_COOLDOWN_SECS",
                defaults.failure_cooldown,
            )?,
        };
        let fetch_timeout = secs_or(&var, "SETTINGS_FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT)?;

        let default_retry = RetryPolicy::default();
        let retry = RetryPolicy::new(
            parse_or(&var, "SETTINGS_RETRY_ATTEMPTS", default_retry.max_attempts)?,
            Duration::from_millis(parse_or(
                &var,
                "SETTINGS_RETRY_BASE_MS",
                u64::try_from(default_retry.base_delay.as_millis()).unwrap_or(u64::MAX),
            )?),
        );

        let storage_defaults = StorageOptions::default();
        let storage = StorageOptions {
            local_root: var("LOCAL_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(storage_defaults.local_root),
            local_url_prefix: var("LOCAL_STORAGE_URL_PREFIX")
                .unwrap_or(storage_defaults.local_url_prefix),
            local_public_base_url: var("LOCAL_STORAGE_PUBLIC_BASE_URL"),
            local_storage_viable: parse_or(&var, "LOCAL_STORAGE_VIABLE", true)?,
            endpoint_override: var("OBJECT_STORE_ENDPOINT"),
            allow_http: parse_or(&var, "OBJECT_STORE_ALLOW_HTTP", false)?,
            retry,
        };

        Ok(Self {
            bind_address,
            repository,
            cache,
            fetch_timeout,
            retry,
            storage,
        })
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

fn secs_or<F>(var: &F, name: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(var, name, default.as_secs()).map(Duration::from_secs)
}
