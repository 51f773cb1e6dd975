use serde::{Deserialize, Serialize};
use shared_types::{SettingsCategory, VersionInfo};
use std::collections::HashMap;

/// Request body for replacing a settings category
#[derive(Debug, Serialize, Deserialize)]
pub struct PutCategoryRequest {
    pub values: HashMap<String, String>,

    /// Expected version for optimistic concurrency control
    /// - None for the first write
    /// - Some("v1") when updating from v1
    #[serde(default)]
    pub expected_version: Option<String>,
}

/// Stored values of a settings category
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub category: SettingsCategory,
    pub values: HashMap<String, String>,
    pub version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutCategoryResponse {
    pub category: SettingsCategory,
    pub version: String,
    /// Settings cache version after the write was applied
    pub config_version: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListVersionsResponse {
    pub versions: Vec<VersionInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigVersionResponse {
    pub config_version: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}
