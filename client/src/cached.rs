use anyhow::Result;
use once_cell::sync::OnceCell;
use shared_types::PublicSettings;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::AppClient;

static INSTANCE: OnceCell<Arc<CachedSettingsClient>> = OnceCell::new();

/// Public settings cached on the client side, revalidated against the server's
/// config version on every read.
pub struct CachedSettingsClient {
    client: AppClient,
    cache: RwLock<Option<PublicSettings>>,
}

impl CachedSettingsClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: AppClient::new(base_url)?,
            cache: RwLock::new(None),
        })
    }

    pub fn initialize(base_url: impl Into<String>) -> Result<()> {
        let instance = Arc::new(Self::new(base_url)?);

        INSTANCE
            .set(instance)
            .map_err(|_| anyhow::anyhow!("CachedSettingsClient already initialized"))?;
        Ok(())
    }

    pub fn instance() -> Result<Arc<Self>> {
        INSTANCE.get().cloned().ok_or_else(|| {
            anyhow::anyhow!("CachedSettingsClient not initialized. Call initialize() first.")
        })
    }

    /// Cached settings when the server version is unchanged, otherwise a fresh copy.
    pub async fn get_settings(&self) -> Result<PublicSettings> {
        let version = self.client.get_config_version().await?;

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.config_version == version) {
                debug!(version, "settings unchanged");
                return Ok(cached.clone());
            }
        }

        let settings = self.client.get_public_settings().await?;
        debug!(
            version = settings.config_version,
            "fetched settings from server"
        );

        {
            let mut cache = self.cache.write().await;
            *cache = Some(settings.clone());
        }

        Ok(settings)
    }

    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }
}
