use anyhow::Result;
use server::config::ServerConfig;
use server::http::{self, AppState};
use server::settings::{
    CredentialSource, EnvCredentialSource, SettingsLoader, SettingsRepository, SettingsStore,
};
use server::storage::StorageService;
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    info!("Starting settings server");

    let config = ServerConfig::from_env()?;

    let repository = Arc::new(SettingsRepository::from_config(config.repository.clone())?);
    let admin: Arc<dyn CredentialSource> = repository.clone();
    let loader = SettingsLoader::new(admin, EnvCredentialSource::from_env())
        .with_fetch_timeout(config.fetch_timeout)
        .with_retry(config.retry);
    let settings = SettingsStore::new(loader, config.cache);

    let storage = Arc::new(StorageService::new(settings.clone(), config.storage.clone()));

    // Warm the cache before accepting requests.
    let initial = settings.get_settings().await;
    if initial.is_fallback {
        tracing::warn!("Serving built-in default settings until the settings store recovers");
    }

    let state = AppState {
        settings,
        repository,
        storage,
    };
    http::start_server(state, config.bind_address).await?;

    Ok(())
}
