//! Uniform error shape for all provider clients (§4.1).

use serde::Serialize;

/// The kind of failure a provider call produced. Drives retry policy and
/// the HTTP status the gateway eventually maps it to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ProviderErrorKind {
    Network,
    Timeout,
    Auth,
    NotFound,
    Conflict,
    RateLimited,
    QuotaExceeded,
    UpstreamInvalid,
    UpstreamFailure,
}

impl ProviderErrorKind {
    /// Whether the retry helper should attempt this kind again.
    pub fn retryable(self) -> bool {
        matches!(
            self,
            ProviderErrorKind::Network
                | ProviderErrorKind::Timeout
                | ProviderErrorKind::RateLimited
                | ProviderErrorKind::UpstreamFailure
        )
    }
}

/// `{kind, http_status?, vendor_message, retryable}` per spec §4.1.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("provider error ({kind:?}): {vendor_message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub http_status: Option<u16>,
    pub vendor_message: String,
    pub retryable: bool,
    /// Present only for `checking_domain` premium-domain surfacing (§4.3).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_price: Option<f64>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, vendor_message: impl Into<String>) -> Self {
        let retryable = kind.retryable();
        Self {
            kind,
            http_status: None,
            vendor_message: vendor_message.into(),
            retryable,
            premium_price: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_premium_price(mut self, price: f64) -> Self {
        self.premium_price = Some(price);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn upstream_invalid(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::UpstreamInvalid, message)
    }

    pub fn upstream_failure(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::UpstreamFailure, message)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::timeout(err.to_string())
        } else if err.is_connect() {
            ProviderError::network(err.to_string())
        } else {
            ProviderError::upstream_failure(err.to_string())
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
