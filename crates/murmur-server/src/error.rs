use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use murmur_store::StoreError;

use crate::auth::AuthError;
use crate::relay::RelayError;

/// Client-facing text for any storage failure. The detail is only logged.
pub const STORAGE_UNAVAILABLE: &str = "Storage unavailable";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RelayError> for ServerError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Validation(msg) => ServerError::BadRequest(msg),
            RelayError::Persistence(msg) => ServerError::Storage(msg),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) => ServerError::BadRequest(msg),
            AuthError::Conflict(msg) => ServerError::Conflict(msg),
            AuthError::InvalidCredentials => ServerError::Unauthorized(e.to_string()),
            AuthError::Backend(msg) => ServerError::Internal(msg),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("User not found".into()),
            other => ServerError::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::Storage(detail) => {
                tracing::error!(error = %detail, "Storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, STORAGE_UNAVAILABLE.to_string())
            }
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "msg": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
