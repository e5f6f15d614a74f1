//! HTTP-facing error type.
//!
//! Every route returns `Result<_, ApiError>`. Component errors
//! (`CoordinatorError`, `ListingError`, `StorageError`, `CoreError`) convert
//! into it, and it renders as `{"success": false, "error": "..."}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use upstep_core::CoreError;
use upstep_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad key, status or payload (400)
    #[error("{0}")]
    Validation(String),
    /// Missing account (404)
    #[error("{0}")]
    NotFound(String),
    /// Bad or missing credential (401)
    #[error("{0}")]
    Unauthorized(String),
    /// Authenticated but not allowed (403)
    #[error("{0}")]
    Forbidden(String),
    /// Unique constraint violation (409)
    #[error("{0}")]
    Conflict(String),
    /// Body over the configured limit (413)
    #[error("{0}")]
    PayloadTooLarge(String),
    /// Account store failure
    #[error("Store error: {0}")]
    Store(StorageError),
    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Store(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UpstreamTimeout(_) | ApiError::UpstreamUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::Validation(rejection.body_text())
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::AlreadyExists { .. } => ApiError::conflict(e.to_string()),
            StorageError::Invalid { .. } => ApiError::Validation(e.to_string()),
            other => ApiError::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let message = match &self {
            ApiError::Store(StorageError::NotFound { .. }) => "Coach not found".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
