#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use client::cached::CachedSettingsClient;
use client::AppClient;
use mockito::{self, Matcher};
use serde_json::json;
use shared_types::{CachedConfig, PublicSettings, SettingsCategory, StorageBackendKind};
use std::collections::HashMap;

fn public_settings_body(config_version: u64) -> String {
    let settings = PublicSettings::from_config(&CachedConfig::fallback(), config_version);
    serde_json::to_string(&settings).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body(r#"{"status":"healthy"}"#)
        .create();

    let client = AppClient::new(server.url()).unwrap();
    let healthy = client.health_check().await.unwrap();
    assert!(healthy);
}

#[tokio::test]
async fn test_get_public_settings() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("GET", "/settings/public")
        .with_status(200)
        .with_body(public_settings_body(7))
        .create();

    let client = AppClient::new(server.url()).unwrap();
    let settings = client.get_public_settings().await.unwrap();

    assert_eq!(settings.site_name, "AI Chat");
    assert_eq!(settings.config_version, 7);
    assert!(settings.is_fallback);
}

#[tokio::test]
async fn test_put_category() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("PUT", "/admin/settings/general")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "values": {"site_name": "Acme"},
            "expected_version": null
        })))
        .with_status(200)
        .with_body(r#"{"category": "general", "version": "v1", "config_version": 3}"#)
        .create();

    let client = AppClient::new(server.url()).unwrap();
    let values: HashMap<String, String> = [("site_name".to_string(), "Acme".to_string())].into();

    let version = client
        .put_category(SettingsCategory::General, values, None)
        .await
        .unwrap();
    assert_eq!(version, "v1");
}

#[tokio::test]
async fn test_put_category_conflict() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("PUT", "/admin/settings/payment")
        .with_status(409)
        .with_body(r#"{"error": "Version Conflict", "details": null}"#)
        .create();

    let client = AppClient::new(server.url()).unwrap();
    let result = client
        .put_category(SettingsCategory::Payment, HashMap::new(), Some("v1"))
        .await;

    assert!(result.unwrap_err().to_string().contains("changed concurrently"));
}

#[tokio::test]
async fn test_list_category_versions() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("GET", "/admin/settings/oauth/versions")
        .with_status(200)
        .with_body(
            r#"{"versions": [
                {"version": "v1", "timestamp": "2024-01-01T00:00:00Z"},
                {"version": "v2", "timestamp": "2024-01-02T00:00:00Z"}
            ]}"#,
        )
        .create();

    let client = AppClient::new(server.url()).unwrap();
    let versions = client
        .list_category_versions(SettingsCategory::Oauth)
        .await
        .unwrap();

    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1].version, "v2");
}

#[tokio::test]
async fn test_upload_sends_content_type() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("PUT", "/storage/objects/avatars/u1.png")
        .match_header("content-type", "image/png")
        .match_body("png-bytes")
        .with_status(201)
        .with_body(
            r#"{"path": "avatars/u1.png", "url": "/uploads/avatars/u1.png", "backend": "local"}"#,
        )
        .create();

    let client = AppClient::new(server.url()).unwrap();
    let result = client
        .upload("avatars/u1.png", "png-bytes", "image/png")
        .await
        .unwrap();

    assert_eq!(result.backend, StorageBackendKind::Local);
    assert_eq!(result.url.as_deref(), Some("/uploads/avatars/u1.png"));
}

#[tokio::test]
async fn test_download_not_found() {
    let mut server = mockito::Server::new_async().await;

    let _m = server
        .mock("GET", "/storage/objects/missing.bin")
        .with_status(404)
        .create();

    let client = AppClient::new(server.url()).unwrap();
    let result = client.download("missing.bin").await;

    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[tokio::test]
async fn test_get_url_and_exists() {
    let mut server = mockito::Server::new_async().await;

    let _url = server
        .mock("GET", "/storage/url/a.png")
        .match_query(Matcher::UrlEncoded("public".into(), "true".into()))
        .with_status(200)
        .with_body(r#"{"url": "https://cdn.example.com/a.png"}"#)
        .create();
    let _exists = server
        .mock("GET", "/storage/exists/a.png")
        .with_status(200)
        .with_body(r#"{"exists": true}"#)
        .create();

    let client = AppClient::new(server.url()).unwrap();
    assert_eq!(
        client.get_url("a.png", true).await.unwrap(),
        "https://cdn.example.com/a.png"
    );
    assert!(client.exists("a.png").await.unwrap());
}

#[tokio::test]
async fn test_cached_client_refetches_only_on_version_change() {
    let mut server = mockito::Server::new_async().await;

    let version_one = server
        .mock("GET", "/settings/version")
        .with_status(200)
        .with_body(r#"{"config_version": 1}"#)
        .expect(2)
        .create_async()
        .await;
    let settings_one = server
        .mock("GET", "/settings/public")
        .with_status(200)
        .with_body(public_settings_body(1))
        .expect(1)
        .create_async()
        .await;

    let client = CachedSettingsClient::new(server.url()).unwrap();
    assert_eq!(client.get_settings().await.unwrap().config_version, 1);
    assert_eq!(client.get_settings().await.unwrap().config_version, 1);

    version_one.assert_async().await;
    settings_one.assert_async().await;
    version_one.remove_async().await;
    settings_one.remove_async().await;

    let _version_two = server
        .mock("GET", "/settings/version")
        .with_status(200)
        .with_body(r#"{"config_version": 2}"#)
        .create_async()
        .await;
    let settings_two = server
        .mock("GET", "/settings/public")
        .with_status(200)
        .with_body(public_settings_body(2))
        .expect(1)
        .create_async()
        .await;

    assert_eq!(client.get_settings().await.unwrap().config_version, 2);
    settings_two.assert_async().await;
}
