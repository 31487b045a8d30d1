//! Edit session error taxonomy (§7).

use wts_providers::error::ProviderError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EditorError {
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("ai vendor error: {0}")]
    Vendor(String),
    #[error("store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for EditorError {
    fn from(err: sqlx::Error) -> Self {
        EditorError::Store(err.to_string())
    }
}

impl From<ProviderError> for EditorError {
    fn from(err: ProviderError) -> Self {
        EditorError::Vendor(err.vendor_message)
    }
}
