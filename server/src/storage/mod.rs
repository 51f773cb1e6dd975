mod config;
mod error;
mod local;
mod object;
mod service;
mod traits;

pub use config::{ObjectStoreCredentials, StorageOptions, StorageProviderConfig};
pub use error::StorageError;
pub use local::LocalBackend;
pub use object::{ObjectStoreBackend, SIGNED_URL_TTL};
pub use service::{Backend, StorageService};
pub use traits::{FileUpload, StorageProvider};
