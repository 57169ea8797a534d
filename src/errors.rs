use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::io;
use thiserror::Error;

/// Failures coming out of a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no such file: {0}")]
    NotFound(String),
    #[error("cannot read {0}: {1}")]
    Unreadable(String, #[source] io::Error),
    #[error("invalid file name: {0}")]
    InvalidName(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Classify an I/O error raised while touching `name`.
    pub fn from_io(name: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            io::ErrorKind::PermissionDenied => StorageError::Unreadable(name.to_string(), err),
            _ => StorageError::Io(err),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No token provided.")]
    AuthMissing,
    #[error("Unauthorized")]
    AuthInvalid,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    UploadRejected(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("404:\nSorry can't find that!")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::AuthMissing => (
                StatusCode::FORBIDDEN,
                Json(json!({ "success": false, "message": self.to_string() })),
            )
                .into_response(),
            ApiError::AuthInvalid => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
            ApiError::Validation(_) | ApiError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            ApiError::UploadRejected(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
        }
    }
}
