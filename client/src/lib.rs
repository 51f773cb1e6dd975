use anyhow::Result;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::Deserialize;
use shared_types::{PublicSettings, SettingsCategory, StorageResult, VersionInfo};
use std::collections::HashMap;
use std::time::Duration;

pub mod cached;

/// Stored admin values of one settings category
#[derive(Debug, Clone, Deserialize)]
pub struct StoredCategory {
    pub values: HashMap<String, String>,
    pub version: Option<String>,
}

/// Client for the settings and file storage service
pub struct AppClient {
    client: ReqwestClient,
    base_url: String,
}

impl AppClient {
    /// Create a new client instance
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check if the service is healthy
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        let response = self.client.get(&url).send().await?;

        Ok(response.status() == StatusCode::OK)
    }

    /// Non-secret site settings
    pub async fn get_public_settings(&self) -> Result<PublicSettings> {
        let url = format!("{}/settings/public", self.base_url);

        let response = self.client.get(&url).send().await?;
        response.error_for_status_ref()?;

        Ok(response.json().await?)
    }

    /// Current settings version; changes whenever served settings may have changed
    pub async fn get_config_version(&self) -> Result<u64> {
        let url = format!("{}/settings/version", self.base_url);

        let response = self.client.get(&url).send().await?;
        response.error_for_status_ref()?;

        let data: serde_json::Value = response.json().await?;
        data["config_version"]
            .as_u64()
            .ok_or_else(|| anyhow::anyhow!("Missing config_version in response"))
    }

    pub async fn get_category(&self, category: SettingsCategory) -> Result<StoredCategory> {
        let url = format!("{}/admin/settings/{}", self.base_url, category);

        let response = self.client.get(&url).send().await?;
        response.error_for_status_ref()?;

        Ok(response.json().await?)
    }

    /// Replace a category's values. Returns the new category version.
    pub async fn put_category(
        &self,
        category: SettingsCategory,
        values: HashMap<String, String>,
        expected_version: Option<&str>,
    ) -> Result<String> {
        let url = format!("{}/admin/settings/{}", self.base_url, category);

        let body = serde_json::json!({
            "values": values,
            "expected_version": expected_version,
        });

        let response = self.client.put(&url).json(&body).send().await?;

        if response.status() == StatusCode::CONFLICT {
            anyhow::bail!("Settings for {} were changed concurrently", category);
        }
        response.error_for_status_ref()?;

        let result: serde_json::Value = response.json().await?;

        Ok(result["version"].as_str().unwrap_or("unknown").to_string())
    }

    /// List all stored versions of a category
    pub async fn list_category_versions(
        &self,
        category: SettingsCategory,
    ) -> Result<Vec<VersionInfo>> {
        let url = format!("{}/admin/settings/{}/versions", self.base_url, category);

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            anyhow::bail!("No stored settings for {}", category);
        }

        response.error_for_status_ref()?;

        let data: serde_json::Value = response.json().await?;
        let versions: Vec<VersionInfo> = serde_json::from_value(data["versions"].clone())?;

        Ok(versions)
    }

    /// Force the server to reload settings
    pub async fn refresh_settings(&self) -> Result<PublicSettings> {
        let url = format!("{}/admin/settings/refresh", self.base_url);

        let response = self.client.post(&url).send().await?;
        response.error_for_status_ref()?;

        Ok(response.json().await?)
    }

    pub async fn upload(
        &self,
        path: &str,
        data: impl Into<reqwest::Body>,
        mime_type: &str,
    ) -> Result<StorageResult> {
        let url = format!("{}/storage/objects/{}", self.base_url, path);

        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(data)
            .send()
            .await?;
        response.error_for_status_ref()?;

        Ok(response.json().await?)
    }

    pub async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/storage/objects/{}", self.base_url, path);

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            anyhow::bail!("File not found: {}", path);
        }
        response.error_for_status_ref()?;

        Ok(response.bytes().await?.to_vec())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = format!("{}/storage/objects/{}", self.base_url, path);

        let response = self.client.delete(&url).send().await?;

        response.error_for_status()?;

        Ok(())
    }

    /// URL for reading a file; `public` asks for a stable URL when one exists
    pub async fn get_url(&self, path: &str, public: bool) -> Result<String> {
        let url = format!(
            "{}/storage/url/{}?public={}",
            self.base_url, path, public
        );

        let response = self.client.get(&url).send().await?;
        response.error_for_status_ref()?;

        let data: serde_json::Value = response.json().await?;
        data["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Missing url in response"))
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let url = format!("{}/storage/exists/{}", self.base_url, path);

        let response = self.client.get(&url).send().await?;
        response.error_for_status_ref()?;

        let data: serde_json::Value = response.json().await?;
        Ok(data["exists"].as_bool().unwrap_or(false))
    }
}
