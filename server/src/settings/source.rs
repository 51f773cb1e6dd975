use async_trait::async_trait;
use shared_types::SettingsCategory;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::retry::Retryable;

/// Failures reported by a credential source, classified up front so callers
/// never have to inspect message text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("settings fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("settings source unavailable: {0}")]
    Unavailable(String),

    #[error("settings source is rate limiting requests")]
    RateLimited,

    #[error("malformed settings: {0}")]
    Malformed(String),

    #[error("settings source rejected the request: {0}")]
    Unauthorized(String),

    #[error("settings source error: {0}")]
    Backend(String),
}

impl Retryable for SourceError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::Timeout(_) | SourceError::Unavailable(_) | SourceError::RateLimited
        )
    }
}

/// Key/value settings grouped by category.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn get_settings_by_category(
        &self,
        category: SettingsCategory,
    ) -> Result<HashMap<String, String>, SourceError>;
}

/// Settings supplied through environment variables.
///
/// Site metadata keys read from `PUBLIC_`-prefixed variables
/// (`site_name` -> `PUBLIC_SITE_NAME`); everything else is the upper-cased key
/// (`r2_account_id` -> `R2_ACCOUNT_ID`).
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialSource {
    vars: HashMap<String, String>,
}

impl EnvCredentialSource {
    /// Snapshot the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn env_var_for(key: &str) -> String {
        if key.starts_with("site_") {
            format!("PUBLIC_{}", key.to_ascii_uppercase())
        } else {
            key.to_ascii_uppercase()
        }
    }

    /// Non-blank value for a setting key.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.vars
            .get(&Self::env_var_for(key))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl CredentialSource for EnvCredentialSource {
    async fn get_settings_by_category(
        &self,
        category: SettingsCategory,
    ) -> Result<HashMap<String, String>, SourceError> {
        Ok(category
            .keys()
            .iter()
            .filter_map(|key| self.lookup(key).map(|v| ((*key).to_string(), v.to_string())))
            .collect())
    }
}
