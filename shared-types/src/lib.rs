#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Admin settings are grouped into categories, each persisted as one document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SettingsCategory {
    General,
    Oauth,
    Payment,
    CloudStorage,
    Security,
    Email,
}

impl SettingsCategory {
    pub const ALL: [SettingsCategory; 6] = [
        SettingsCategory::General,
        SettingsCategory::Oauth,
        SettingsCategory::Payment,
        SettingsCategory::CloudStorage,
        SettingsCategory::Security,
        SettingsCategory::Email,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingsCategory::General => "general",
            SettingsCategory::Oauth => "oauth",
            SettingsCategory::Payment => "payment",
            SettingsCategory::CloudStorage => "cloud_storage",
            SettingsCategory::Security => "security",
            SettingsCategory::Email => "email",
        }
    }

    /// Setting keys stored under this category.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            SettingsCategory::General => &[
                "site_name",
                "site_title",
                "site_description",
                "site_url",
                "site_logo_url",
                "site_dark_logo_url",
                "site_favicon_url",
            ],
            SettingsCategory::Oauth => &[
                "google_client_id",
                "google_client_secret",
                "google_oauth_enabled",
                "github_client_id",
                "github_client_secret",
                "github_oauth_enabled",
            ],
            SettingsCategory::Payment => &[
                "stripe_secret_key",
                "stripe_publishable_key",
                "stripe_webhook_secret",
                "stripe_enabled",
            ],
            SettingsCategory::CloudStorage => &[
                "r2_account_id",
                "r2_access_key_id",
                "r2_secret_access_key",
                "r2_bucket_name",
                "r2_public_url",
            ],
            SettingsCategory::Security => &["auth_secret", "encryption_key"],
            SettingsCategory::Email => &[
                "smtp_host",
                "smtp_port",
                "smtp_user",
                "smtp_password",
                "email_from",
            ],
        }
    }

    /// Find the category that owns `key`.
    pub fn of_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.keys().contains(&key))
    }
}

impl fmt::Display for SettingsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingsCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown settings category: {s}"))
    }
}

/// Built-in value used when neither the admin store nor the environment
/// provides one. Secrets default to empty.
pub fn default_value(key: &str) -> &'static str {
    match key {
        "site_name" => "AI Chat",
        "site_title" => "AI Chat - Unified AI Interface",
        "site_description" => "Chat with text, image and video models in one place",
        "site_url" => "http://localhost:5173",
        "site_logo_url" => "/logo.png",
        "site_dark_logo_url" => "/logo-dark.png",
        "site_favicon_url" => "/favicon.ico",
        "smtp_port" => "587",
        "google_oauth_enabled" | "github_oauth_enabled" | "stripe_enabled" => "false",
        _ => "",
    }
}

/// Snapshot of every resolved setting. Replaced wholesale on refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedConfig {
    // general
    pub site_name: String,
    pub site_title: String,
    pub site_description: String,
    pub site_url: String,
    pub site_logo_url: String,
    pub site_dark_logo_url: String,
    pub site_favicon_url: String,

    // oauth
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_oauth_enabled: bool,
    pub github_client_id: String,
    pub github_client_secret: String,
    pub github_oauth_enabled: bool,

    // payment
    pub stripe_secret_key: String,
    pub stripe_publishable_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_enabled: bool,

    // cloud storage
    pub r2_account_id: String,
    pub r2_access_key_id: String,
    pub r2_secret_access_key: String,
    pub r2_bucket_name: String,
    pub r2_public_url: String,

    // security
    pub auth_secret: String,
    pub encryption_key: String,

    // email
    pub smtp_host: String,
    pub smtp_port: String,
    pub smtp_user: String,
    pub smtp_password: String,
    pub email_from: String,

    pub last_updated: DateTime<Utc>,
    /// Set when the values are the built-in defaults rather than fetched settings.
    pub is_fallback: bool,
}

impl CachedConfig {
    /// Build a snapshot from resolved key/value pairs. Blank or missing keys take
    /// their built-in default.
    pub fn from_values(values: &HashMap<String, String>, is_fallback: bool) -> Self {
        let text = |key: &str| -> String {
            values
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default_value(key))
                .to_string()
        };
        let flag = |key: &str| parse_flag(&text(key));

        Self {
            site_name: text("site_name"),
            site_title: text("site_title"),
            site_description: text("site_description"),
            site_url: text("site_url"),
            site_logo_url: text("site_logo_url"),
            site_dark_logo_url: text("site_dark_logo_url"),
            site_favicon_url: text("site_favicon_url"),
            google_client_id: text("google_client_id"),
            google_client_secret: text("google_client_secret"),
            google_oauth_enabled: flag("google_oauth_enabled"),
            github_client_id: text("github_client_id"),
            github_client_secret: text("github_client_secret"),
            github_oauth_enabled: flag("github_oauth_enabled"),
            stripe_secret_key: text("stripe_secret_key"),
            stripe_publishable_key: text("stripe_publishable_key"),
            stripe_webhook_secret: text("stripe_webhook_secret"),
            stripe_enabled: flag("stripe_enabled"),
            r2_account_id: text("r2_account_id"),
            r2_access_key_id: text("r2_access_key_id"),
            r2_secret_access_key: text("r2_secret_access_key"),
            r2_bucket_name: text("r2_bucket_name"),
            r2_public_url: text("r2_public_url"),
            auth_secret: text("auth_secret"),
            encryption_key: text("encryption_key"),
            smtp_host: text("smtp_host"),
            smtp_port: text("smtp_port"),
            smtp_user: text("smtp_user"),
            smtp_password: text("smtp_password"),
            email_from: text("email_from"),
            last_updated: Utc::now(),
            is_fallback,
        }
    }

    /// Hard-coded defaults served when real settings cannot be obtained.
    pub fn fallback() -> Self {
        Self::from_values(&HashMap::new(), true)
    }

    /// Look up a single setting by its key. Flags render as `"true"`/`"false"`.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "site_name" => &self.site_name,
            "site_title" => &self.site_title,
            "site_description" => &self.site_description,
            "site_url" => &self.site_url,
            "site_logo_url" => &self.site_logo_url,
            "site_dark_logo_url" => &self.site_dark_logo_url,
            "site_favicon_url" => &self.site_favicon_url,
            "google_client_id" => &self.google_client_id,
            "google_client_secret" => &self.google_client_secret,
            "google_oauth_enabled" => return Some(self.google_oauth_enabled.to_string()),
            "github_client_id" => &self.github_client_id,
            "github_client_secret" => &self.github_client_secret,
            "github_oauth_enabled" => return Some(self.github_oauth_enabled.to_string()),
            "stripe_secret_key" => &self.stripe_secret_key,
            "stripe_publishable_key" => &self.stripe_publishable_key,
            "stripe_webhook_secret" => &self.stripe_webhook_secret,
            "stripe_enabled" => return Some(self.stripe_enabled.to_string()),
            "r2_account_id" => &self.r2_account_id,
            "r2_access_key_id" => &self.r2_access_key_id,
            "r2_secret_access_key" => &self.r2_secret_access_key,
            "r2_bucket_name" => &self.r2_bucket_name,
            "r2_public_url" => &self.r2_public_url,
            "auth_secret" => &self.auth_secret,
            "encryption_key" => &self.encryption_key,
            "smtp_host" => &self.smtp_host,
            "smtp_port" => &self.smtp_port,
            "smtp_user" => &self.smtp_user,
            "smtp_password" => &self.smtp_password,
            "email_from" => &self.email_from,
            _ => return None,
        };
        Some(value.clone())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Non-secret view of the configuration, safe to hand to browsers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicSettings {
    pub site_name: String,
    pub site_title: String,
    pub site_description: String,
    pub site_url: String,
    pub site_logo_url: String,
    pub site_dark_logo_url: String,
    pub site_favicon_url: String,
    pub google_oauth_enabled: bool,
    pub github_oauth_enabled: bool,
    pub stripe_enabled: bool,
    pub stripe_publishable_key: String,
    pub is_fallback: bool,
    pub config_version: u64,
    pub last_updated: DateTime<Utc>,
}

impl PublicSettings {
    pub fn from_config(config: &CachedConfig, config_version: u64) -> Self {
        Self {
            site_name: config.site_name.clone(),
            site_title: config.site_title.clone(),
            site_description: config.site_description.clone(),
            site_url: config.site_url.clone(),
            site_logo_url: config.site_logo_url.clone(),
            site_dark_logo_url: config.site_dark_logo_url.clone(),
            site_favicon_url: config.site_favicon_url.clone(),
            google_oauth_enabled: config.google_oauth_enabled,
            github_oauth_enabled: config.github_oauth_enabled,
            stripe_enabled: config.stripe_enabled,
            stripe_publishable_key: config.stripe_publishable_key.clone(),
            is_fallback: config.is_fallback,
            config_version,
            last_updated: config.last_updated,
        }
    }
}

/// Which storage backend served a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackendKind {
    Local,
    ObjectStore,
}

impl fmt::Display for StorageBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackendKind::Local => f.write_str("local"),
            StorageBackendKind::ObjectStore => f.write_str("object-store"),
        }
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageResult {
    pub path: String,
    pub url: Option<String>,
    pub backend: StorageBackendKind,
}

/// Version information for a stored settings category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub timestamp: DateTime<Utc>,
}
