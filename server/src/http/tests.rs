use super::dto::*;
use super::{router, AppState};
use crate::settings::{
    CredentialSource, EnvCredentialSource, RepositoryConfig, SettingsLoader, SettingsRepository,
    SettingsStore, SettingsStoreConfig,
};
use crate::storage::{StorageOptions, StorageService};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use shared_types::{PublicSettings, StorageBackendKind, StorageResult};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

fn create_test_app() -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let repository = Arc::new(
        SettingsRepository::from_config(RepositoryConfig::local(temp_dir.path().join("settings")))
            .unwrap(),
    );
    let admin: Arc<dyn CredentialSource> = repository.clone();
    let settings = SettingsStore::new(
        SettingsLoader::new(admin, EnvCredentialSource::default()),
        SettingsStoreConfig::default(),
    );
    let storage = Arc::new(StorageService::new(
        settings.clone(),
        StorageOptions {
            local_root: temp_dir.path().join("uploads"),
            ..StorageOptions::default()
        },
    ));

    let app = router(AppState {
        settings,
        repository,
        storage,
    });
    (app, temp_dir)
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn get(app: &Router, uri: &str) -> Response {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn put_json<T: serde::Serialize>(app: &Router, uri: &str, body: &T) -> Response {
    send(
        app,
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap(),
    )
    .await
}

async fn json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn general_update(site_name: &str, expected_version: Option<&str>) -> PutCategoryRequest {
    PutCategoryRequest {
        values: [("site_name".to_string(), site_name.to_string())].into(),
        expected_version: expected_version.map(str::to_string),
    }
}

#[tokio::test]
async fn test_health_check() {
    let (app, _dir) = create_test_app();

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "settings-server");
    assert!(body.get("timestamp").is_some());
}

#[tokio::test]
async fn test_public_settings_use_defaults_without_admin_values() {
    let (app, _dir) = create_test_app();

    let response = get(&app, "/settings/public").await;
    assert_eq!(response.status(), StatusCode::OK);

    let settings: PublicSettings = json(response).await;
    assert_eq!(settings.site_name, "AI Chat");
    assert!(!settings.is_fallback);
    assert_eq!(settings.config_version, 1);
}

#[tokio::test]
async fn test_admin_update_is_visible_immediately() {
    let (app, _dir) = create_test_app();
    let before: PublicSettings = json(get(&app, "/settings/public").await).await;

    let response = put_json(&app, "/admin/settings/general", &general_update("Acme", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: PutCategoryResponse = json(response).await;
    assert_eq!(updated.version, "v1");
    assert!(updated.config_version > before.config_version);

    let after: PublicSettings = json(get(&app, "/settings/public").await).await;
    assert_eq!(after.site_name, "Acme");
    assert!(after.config_version > before.config_version);

    let stored: CategoryResponse = json(get(&app, "/admin/settings/general").await).await;
    assert_eq!(stored.version.as_deref(), Some("v1"));
    assert_eq!(stored.values.get("site_name").map(String::as_str), Some("Acme"));
}

#[tokio::test]
async fn test_category_updates_use_optimistic_locking() {
    let (app, _dir) = create_test_app();
    put_json(&app, "/admin/settings/general", &general_update("One", None)).await;

    let response = put_json(&app, "/admin/settings/general", &general_update("Two", None)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response =
        put_json(&app, "/admin/settings/general", &general_update("Two", Some("v1"))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response =
        put_json(&app, "/admin/settings/general", &general_update("Three", Some("v1"))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error: ErrorResponse = json(response).await;
    assert_eq!(error.error, "Version Conflict");

    let history: ListVersionsResponse =
        json(get(&app, "/admin/settings/general/versions").await).await;
    let versions: Vec<&str> = history.versions.iter().map(|v| v.version.as_str()).collect();
    assert_eq!(versions, ["v1", "v2"]);
}

#[tokio::test]
async fn test_bad_category_and_foreign_key_are_rejected() {
    let (app, _dir) = create_test_app();

    let response = get(&app, "/admin/settings/billing").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = PutCategoryRequest {
        values: [("stripe_secret_key".to_string(), "sk_live".to_string())].into(),
        expected_version: None,
    };
    let response = put_json(&app, "/admin/settings/general", &request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_versions_of_unwritten_category_is_not_found() {
    let (app, _dir) = create_test_app();
    let response = get(&app, "/admin/settings/email/versions").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refresh_reports_current_version() {
    let (app, _dir) = create_test_app();
    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/admin/settings/refresh")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let settings: PublicSettings = json(response).await;

    let version: ConfigVersionResponse = json(get(&app, "/settings/version").await).await;
    assert_eq!(settings.config_version, version.config_version);
}

#[tokio::test]
async fn test_local_file_lifecycle() {
    let (app, _dir) = create_test_app();

    let response = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri("/storage/objects/docs/readme.txt")
            .header("content-type", "text/plain")
            .body(Body::from("hello"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let stored: StorageResult = json(response).await;
    assert_eq!(stored.backend, StorageBackendKind::Local);
    assert_eq!(stored.url.as_deref(), Some("/uploads/docs/readme.txt"));

    let exists: ExistsResponse = json(get(&app, "/storage/exists/docs/readme.txt").await).await;
    assert!(exists.exists);

    let url: UrlResponse = json(get(&app, "/storage/url/docs/readme.txt?public=true").await).await;
    assert_eq!(url.url, "/uploads/docs/readme.txt");

    for uri in ["/storage/objects/docs/readme.txt", "/uploads/docs/readme.txt"] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    let response = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/storage/objects/docs/readme.txt")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(&app, "/storage/objects/docs/readme.txt").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let exists: ExistsResponse = json(get(&app, "/storage/exists/docs/readme.txt").await).await;
    assert!(!exists.exists);
}

#[tokio::test]
async fn test_read_old_version_and_delete_category() {
    let (app, _dir) = create_test_app();
    put_json(&app, "/admin/settings/general", &general_update("One", None)).await;
    put_json(&app, "/admin/settings/general", &general_update("Two", Some("v1"))).await;

    let old: CategoryResponse = json(get(&app, "/admin/settings/general/versions/v1").await).await;
    assert_eq!(old.values.get("site_name").map(String::as_str), Some("One"));

    let response = get(&app, "/admin/settings/general/versions/v9").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/admin/settings/general")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let settings: PublicSettings = json(get(&app, "/settings/public").await).await;
    assert_eq!(settings.site_name, "AI Chat");
}
