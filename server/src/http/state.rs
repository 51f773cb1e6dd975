use crate::settings::{SettingsRepository, SettingsStore};
use crate::storage::StorageService;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: SettingsStore,
    pub repository: Arc<SettingsRepository>,
    pub storage: Arc<StorageService>,
}
