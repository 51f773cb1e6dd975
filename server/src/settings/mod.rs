mod cache;
mod loader;
mod repository;
mod source;
mod version;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{
    DEFAULT_FAILURE_COOLDOWN, DEFAULT_TTL, SettingsStore, SettingsStoreConfig, VersionedConfig,
};
pub use loader::{DEFAULT_FETCH_TIMEOUT, SettingsLoader};
pub use repository::{CategorySettings, RepositoryConfig, RepositoryError, SettingsRepository};
pub use source::{CredentialSource, EnvCredentialSource, SourceError};
pub use version::VersionedSlot;
