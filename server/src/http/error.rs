use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::dto::ErrorResponse;
use crate::settings::RepositoryError;
use crate::storage::StorageError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    VersionConflict { expected: String, actual: String },
    ServiceUnavailable(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", Some(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", Some(msg)),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg)),
            ApiError::VersionConflict { expected, actual } => (
                StatusCode::CONFLICT,
                "Version Conflict",
                Some(format!(
                    "Expected version {}, but found {}",
                    expected, actual
                )),
            ),
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable",
                Some(msg),
            ),
            ApiError::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                Some(msg),
            ),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => ApiError::NotFound(format!("File not found: {path}")),
            StorageError::InvalidPath(path) => {
                ApiError::BadRequest(format!("Invalid storage path: {path}"))
            }
            e @ (StorageError::Transient { .. } | StorageError::ObjectStoreRequired(_)) => {
                ApiError::ServiceUnavailable(e.to_string())
            }
            e => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => {
                ApiError::NotFound(format!("Settings not found: {what}"))
            }
            RepositoryError::Store(object_store::Error::NotFound { path, .. }) => {
                ApiError::NotFound(format!("Settings not found: {path}"))
            }
            RepositoryError::AlreadyExists(msg) => ApiError::Conflict(msg),
            RepositoryError::VersionConflict { expected, actual } => {
                ApiError::VersionConflict { expected, actual }
            }
            e @ RepositoryError::UnknownKey { .. } => ApiError::BadRequest(e.to_string()),
            e @ RepositoryError::Store(object_store::Error::Generic { .. }) => {
                ApiError::ServiceUnavailable(e.to_string())
            }
            e => ApiError::InternalError(e.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
