//! Gateway configuration. Thin re-export of [`wts_shared::config`] so the
//! binary and its handlers share one layered-config implementation
//! (`config/default.toml` base plus the flat environment variables named
//! in the external interfaces contract) instead of each crate parsing env
//! vars independently.

pub use wts_shared::config::{
    Config, DatabaseConfig, FeatureFlags, LogFormat, ObservabilityConfig, ProviderCredentials, ServerConfig,
};
