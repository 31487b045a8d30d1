//! Multi-tenant AI proxy gateway (C6): opaque-key auth, per-tier quota and
//! model policy enforcement, vendor dispatch, and usage logging.

pub mod admin;
pub mod error;
pub mod key;
pub mod pipeline;
pub mod store;

pub use error::ProxyError;
pub use pipeline::{handle_chat_completion, list_models, ChatCompletionRequest, ChatCompletionResponse, Vendors};
pub use store::{NewRequestLog, ProxyRequestLog, ProxySite, ProxySubscriptionTier, SiteStatus, Store, UsageSnapshot};
