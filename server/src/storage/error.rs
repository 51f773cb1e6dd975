use thiserror::Error;

use crate::retry::Retryable;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Transient storage failure during {operation}: {message}")]
    Transient {
        operation: &'static str,
        message: String,
    },

    #[error("Storage failure during {operation}: {message}")]
    Permanent {
        operation: &'static str,
        message: String,
    },

    /// Object storage is the only durable option and cannot be used.
    #[error("Object storage is required but unavailable: {0}")]
    ObjectStoreRequired(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Normalize an object store failure at the backend boundary.
    pub(crate) fn from_store(operation: &'static str, path: &str, err: &object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => Self::NotFound(path.to_string()),
            object_store::Error::InvalidPath { .. } => Self::InvalidPath(path.to_string()),
            object_store::Error::Generic { .. } | object_store::Error::JoinError { .. } => {
                Self::Transient {
                    operation,
                    message: err.to_string(),
                }
            }
            other => Self::Permanent {
                operation,
                message: other.to_string(),
            },
        }
    }
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        match self {
            StorageError::Transient { .. } => true,
            StorageError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
