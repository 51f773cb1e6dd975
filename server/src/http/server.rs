use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::{handlers, state::AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Public settings
        .route("/settings/public", get(handlers::get_public_settings))
        .route("/settings/version", get(handlers::get_config_version))
        // Admin settings
        .route("/admin/settings/refresh", post(handlers::refresh_settings))
        .route(
            "/admin/settings/:category",
            get(handlers::get_category)
                .put(handlers::put_category)
                .delete(handlers::delete_category),
        )
        .route(
            "/admin/settings/:category/versions",
            get(handlers::list_category_versions),
        )
        .route(
            "/admin/settings/:category/versions/:version",
            get(handlers::get_category_at_version),
        )
        // Files
        .route(
            "/storage/objects/*path",
            get(handlers::download_object)
                .put(handlers::upload_object)
                .delete(handlers::delete_object),
        )
        .route("/storage/url/*path", get(handlers::get_object_url))
        .route("/storage/exists/*path", get(handlers::object_exists))
        .route("/uploads/*path", get(handlers::serve_upload))
        .with_state(Arc::new(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server(state: AppState, bind_address: SocketAddr) -> Result<()> {
    let app = router(state);

    info!("Server listening on {}", bind_address);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
