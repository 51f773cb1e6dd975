use futures::future::try_join_all;
use shared_types::{CachedConfig, SettingsCategory};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::source::{CredentialSource, EnvCredentialSource, SourceError};
use crate::retry::RetryPolicy;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolves a full [`CachedConfig`] from the admin store, the environment and
/// built-in defaults, in that order of precedence.
pub struct SettingsLoader {
    admin: Arc<dyn CredentialSource>,
    env: EnvCredentialSource,
    fetch_timeout: Duration,
    retry: RetryPolicy,
}

impl SettingsLoader {
    pub fn new(admin: Arc<dyn CredentialSource>, env: EnvCredentialSource) -> Self {
        Self {
            admin,
            env,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch every category, retrying transient failures.
    pub async fn load(&self) -> Result<CachedConfig, SourceError> {
        let admin = self
            .retry
            .run("settings fetch", || self.fetch_admin_once())
            .await?;
        Ok(self.resolve(&admin))
    }

    async fn fetch_admin_once(&self) -> Result<HashMap<String, String>, SourceError> {
        let fetches = SettingsCategory::ALL
            .into_iter()
            .map(|category| self.admin.get_settings_by_category(category));

        let categories = tokio::time::timeout(self.fetch_timeout, try_join_all(fetches))
            .await
            .map_err(|_| SourceError::Timeout(self.fetch_timeout))??;

        let merged: HashMap<String, String> = categories.into_iter().flatten().collect();
        debug!(keys = merged.len(), "fetched admin settings");
        Ok(merged)
    }

    /// Merge admin values over environment values; blanks fall through.
    pub fn resolve(&self, admin: &HashMap<String, String>) -> CachedConfig {
        let mut resolved = HashMap::new();
        for category in SettingsCategory::ALL {
            for key in category.keys() {
                let value = admin
                    .get(*key)
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .or_else(|| self.env.lookup(key));
                if let Some(value) = value {
                    resolved.insert((*key).to_string(), value.to_string());
                }
            }
        }
        CachedConfig::from_values(&resolved, false)
    }
}
