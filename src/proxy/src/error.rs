//! Proxy-local error taxonomy (§7), mapped to HTTP status at the gateway
//! boundary via `IntoResponse` (built in `wts-gateway`, not here, so this
//! crate stays runnable without axum).

use wts_providers::error::ProviderError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProxyError {
    #[error("missing or malformed bearer token")]
    Unauthorized,
    #[error("site is revoked")]
    Revoked,
    #[error("quota exceeded: used {used} of {limit}")]
    QuotaExceeded { used: i64, limit: i64 },
    #[error("model {0} is not permitted for this tier")]
    ModelNotAllowed(String),
    #[error("model {0} has no recognized vendor prefix")]
    UnknownModel(String),
    #[error("upstream vendor error: {0}")]
    UpstreamError(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for ProxyError {
    fn from(err: sqlx::Error) -> Self {
        ProxyError::Store(err.to_string())
    }
}

impl From<ProviderError> for ProxyError {
    fn from(err: ProviderError) -> Self {
        ProxyError::UpstreamError(err.vendor_message)
    }
}
