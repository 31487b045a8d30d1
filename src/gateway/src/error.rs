//! Error handling for the gateway (§7).
//!
//! Mirrors the error taxonomy described in the external interfaces
//! contract: one `thiserror`-derived enum, `status_code()`/`error_type()`/
//! `should_log()` methods, and an `IntoResponse` impl. Provider/workflow/
//! proxy/editor errors convert in via `#[from]` at the handler boundary.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use wts_editor::EditorError;
use wts_providers::error::ProviderError;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream error: {0}")]
    UpstreamError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound(resource.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Config(_) | ApiError::Json(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found_error",
            ApiError::Unauthorized(_) => "authentication_error",
            ApiError::Forbidden(_) => "authorization_error",
            ApiError::Conflict(_) => "conflict_error",
            ApiError::UpstreamError(_) => "upstream_error",
            ApiError::Database(_) => "database_error",
            ApiError::Config(_) => "configuration_error",
            ApiError::Json(_) => "json_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn should_log(&self) -> bool {
        !matches!(
            self,
            ApiError::Validation(_) | ApiError::NotFound(_) | ApiError::Unauthorized(_) | ApiError::Forbidden(_)
        )
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        if err.kind.retryable() || err.http_status == Some(502) || err.http_status == Some(503) {
            ApiError::UpstreamError(err.vendor_message)
        } else {
            ApiError::Internal(err.vendor_message)
        }
    }
}

impl From<EditorError> for ApiError {
    fn from(err: EditorError) -> Self {
        match err {
            EditorError::SessionNotFound(id) => ApiError::NotFound(format!("session {id}")),
            EditorError::Vendor(message) => ApiError::UpstreamError(message),
            EditorError::Store(message) => ApiError::Internal(message),
        }
    }
}

impl From<Vec<String>> for ApiError {
    fn from(errors: Vec<String>) -> Self {
        ApiError::Validation(errors.join("; "))
    }
}

/// Richer internal shape the gateway returns for non-proxy endpoints: the
/// normative `error.type`/`message` pair plus additive request-tracing
/// fields. `/v1/*` proxy responses use the narrower OpenAI-compatible
/// envelope instead (`handlers::proxy::proxy_error_response`).
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub request_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();
        let message = self.to_string();

        if self.should_log() {
            error!(error = %self, status = %status, error_type, "request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
            request_id: None,
            timestamp: chrono::Utc::now(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(ApiError::validation("bad field").status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_does_not_log() {
        assert!(!ApiError::not_found("site").should_log());
    }

    #[test]
    fn upstream_error_maps_to_502() {
        assert_eq!(ApiError::UpstreamError("boom".to_string()).status_code(), StatusCode::BAD_GATEWAY);
    }
}
