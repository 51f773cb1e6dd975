use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared_types::{PublicSettings, SettingsCategory, StorageBackendKind, StorageResult};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    dto::{
        CategoryResponse, ConfigVersionResponse, ExistsResponse, ListVersionsResponse,
        PutCategoryRequest, PutCategoryResponse, UrlResponse,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};
use crate::storage::FileUpload;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UrlParams {
    #[serde(default)]
    pub public: bool,
}

fn parse_category(raw: &str) -> ApiResult<SettingsCategory> {
    raw.parse().map_err(ApiError::BadRequest)
}

/// GET /settings/public
/// Non-secret settings for rendering the site
pub async fn get_public_settings(State(state): State<Arc<AppState>>) -> Json<PublicSettings> {
    Json(state.settings.public_settings().await)
}

/// GET /settings/version
pub async fn get_config_version(State(state): State<Arc<AppState>>) -> Json<ConfigVersionResponse> {
    Json(ConfigVersionResponse {
        config_version: state.settings.get_config_version(),
    })
}

/// GET /admin/settings/:category
/// Stored admin values of one category
#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<Json<CategoryResponse>> {
    let category = parse_category(&category)?;
    info!("Getting settings category: {}", category);

    let stored = state.repository.get_category(category).await?;

    Ok(Json(CategoryResponse {
        category,
        values: stored.values,
        version: stored.version,
    }))
}

/// PUT /admin/settings/:category
/// Replace a category's stored values and invalidate the settings cache
#[instrument(skip(state, request))]
pub async fn put_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Json(request): Json<PutCategoryRequest>,
) -> ApiResult<Json<PutCategoryResponse>> {
    let category = parse_category(&category)?;
    info!("Updating settings category: {}", category);

    let version = state
        .repository
        .put_category(category, request.values, request.expected_version.as_deref())
        .await?;

    state.settings.clear();

    Ok(Json(PutCategoryResponse {
        category,
        version,
        config_version: state.settings.get_config_version(),
    }))
}

/// GET /admin/settings/:category/versions
#[instrument(skip(state))]
pub async fn list_category_versions(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<Json<ListVersionsResponse>> {
    let category = parse_category(&category)?;
    info!("Listing versions for settings category: {}", category);

    let versions = state.repository.list_versions(category).await?;

    Ok(Json(ListVersionsResponse { versions }))
}

/// GET /admin/settings/:category/versions/:version
#[instrument(skip(state))]
pub async fn get_category_at_version(
    State(state): State<Arc<AppState>>,
    Path((category, version)): Path<(String, String)>,
) -> ApiResult<Json<CategoryResponse>> {
    let category = parse_category(&category)?;
    info!("Getting settings category {} @ {}", category, version);

    let values = state
        .repository
        .get_category_version(category, &version)
        .await?;

    Ok(Json(CategoryResponse {
        category,
        values,
        version: Some(version),
    }))
}

/// DELETE /admin/settings/:category
/// Drop every stored version; values fall back to env and defaults
#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<StatusCode> {
    let category = parse_category(&category)?;
    info!("Deleting settings category: {}", category);

    state.repository.delete_category(category).await?;
    state.settings.clear();

    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/settings/refresh
/// Reload settings now instead of waiting for the TTL
#[instrument(skip(state))]
pub async fn refresh_settings(State(state): State<Arc<AppState>>) -> Json<PublicSettings> {
    info!("Forcing settings refresh");
    let refreshed = state.settings.refresh_versioned().await;
    Json(PublicSettings::from_config(
        &refreshed.config,
        refreshed.version,
    ))
}

/// PUT /storage/objects/*path
/// Store the request body, typed by its Content-Type header
#[instrument(skip(state, headers, body))]
pub async fn upload_object(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<StorageResult>)> {
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string();
    info!("Uploading {} ({} bytes, {})", path, body.len(), mime_type);

    let result = state
        .storage
        .upload(FileUpload::new(body, mime_type), &path)
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /storage/objects/*path
#[instrument(skip(state))]
pub async fn download_object(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let data = state.storage.download(&path).await?;
    Ok(([(header::CONTENT_TYPE, DEFAULT_MIME_TYPE)], data))
}

/// DELETE /storage/objects/*path
#[instrument(skip(state))]
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> ApiResult<StatusCode> {
    info!("Deleting {}", path);
    state.storage.delete(&path).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /storage/url/*path?public=bool
#[instrument(skip(state))]
pub async fn get_object_url(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(params): Query<UrlParams>,
) -> ApiResult<Json<UrlResponse>> {
    let url = if params.public {
        state.storage.get_public_url(&path).await?
    } else {
        state.storage.get_url(&path).await?
    };
    Ok(Json(UrlResponse { url }))
}

/// GET /storage/exists/*path
pub async fn object_exists(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Json<ExistsResponse> {
    Json(ExistsResponse {
        exists: state.storage.exists(&path).await,
    })
}

/// GET /uploads/*path
/// Files written by the local backend
#[instrument(skip(state))]
pub async fn serve_upload(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if state.storage.active_backend().await? != StorageBackendKind::Local {
        return Err(ApiError::NotFound(format!("File not found: {path}")));
    }
    let data = state.storage.download(&path).await?;
    Ok(([(header::CONTENT_TYPE, DEFAULT_MIME_TYPE)], data))
}

/// GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "settings-server",
        "config_version": state.settings.get_config_version(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
