//! Shared configuration types for the wts-core platform.
//!
//! Every field here corresponds to an environment variable or default named
//! in the external interfaces contract; `Config::from_env` layers a
//! `config/default.toml` base with environment overrides the way the rest of
//! this workspace's ancestry does, using a `__` separator so nested fields
//! map onto `SECTION__FIELD` variables.

use serde::{Deserialize, Serialize};

/// Server configuration for the gateway's HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_seconds: 30,
        }
    }
}

/// Database configuration. `max_connections` defaults to the pool target
/// named in the concurrency model (10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/wts_core".to_string(),
            max_connections: 10,
            connect_timeout_seconds: 10,
        }
    }
}

/// Logging/tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub jaeger_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            jaeger_endpoint: None,
        }
    }
}

/// Feature gates named in the external interfaces contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub enable_ai_proxy: bool,
    pub enable_plugin_api: bool,
    pub enable_user_auth: bool,
    pub enable_voice_flow: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_ai_proxy: true,
            enable_plugin_api: true,
            enable_user_auth: false,
            enable_voice_flow: false,
        }
    }
}

/// Provider credentials. Presence/absence drives fallback behavior (e.g. the
/// scraper's native fallback when `firecrawl_api_key` is absent) rather than
/// failing at config-load time — individual provider clients raise
/// `ConfigurationError` only when a credential-requiring path is exercised.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub insta_wp_api_key: Option<String>,
    pub cloudflare_api_key: Option<String>,
    pub cloudflare_email: Option<String>,
    pub cloudflare_account_id: Option<String>,
    pub namecheap_api_key: Option<String>,
    pub namecheap_username: Option<String>,
    pub namecheap_client_ip: Option<String>,
    pub namecheap_sandbox: bool,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub firecrawl_api_key: Option<String>,
}

/// Top-level configuration assembled by the gateway binary at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
    pub features: FeatureFlags,
    pub providers: ProviderCredentials,
    pub proxy_admin_secret: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            observability: ObservabilityConfig::default(),
            features: FeatureFlags::default(),
            providers: ProviderCredentials::default(),
            proxy_admin_secret: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from `config/default.toml` (if present) layered
    /// with environment variables, then apply the handful of flat
    /// environment variables the external interfaces contract names
    /// directly (e.g. `OPENAI_API_KEY`) on top.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize().unwrap_or_default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            cfg.database.url = url;
        }
        if let Ok(secret) = std::env::var("PROXY_ADMIN_SECRET") {
            cfg.proxy_admin_secret = secret;
        }

        let p = &mut cfg.providers;
        p.insta_wp_api_key = std::env::var("INSTA_WP_API_KEY").ok().or(p.insta_wp_api_key.take());
        p.cloudflare_api_key = std::env::var("CLOUDFLARE_API_KEY").ok().or(p.cloudflare_api_key.take());
        p.cloudflare_email = std::env::var("CLOUDFLARE_EMAIL").ok().or(p.cloudflare_email.take());
        p.cloudflare_account_id =
            std::env::var("CLOUDFLARE_ACCOUNT_ID").ok().or(p.cloudflare_account_id.take());
        p.namecheap_api_key = std::env::var("NAMECHEAP_API_KEY").ok().or(p.namecheap_api_key.take());
        p.namecheap_username = std::env::var("NAMECHEAP_USERNAME").ok().or(p.namecheap_username.take());
        p.namecheap_client_ip =
            std::env::var("NAMECHEAP_CLIENT_IP").ok().or(p.namecheap_client_ip.take());
        p.namecheap_sandbox = std::env::var("NAMECHEAP_SANDBOX")
            .ok()
            .map(|v| v == "true" || v == "1")
            .unwrap_or(p.namecheap_sandbox);
        p.openai_api_key = std::env::var("OPENAI_API_KEY").ok().or(p.openai_api_key.take());
        p.gemini_api_key = std::env::var("GEMINI_API_KEY").ok().or(p.gemini_api_key.take());
        p.anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").ok().or(p.anthropic_api_key.take());
        p.firecrawl_api_key = std::env::var("FIRECRAWL_API_KEY").ok().or(p.firecrawl_api_key.take());

        for (flag, env_name) in [
            (&mut cfg.features.enable_ai_proxy, "ENABLE_AI_PROXY"),
            (&mut cfg.features.enable_plugin_api, "ENABLE_PLUGIN_API"),
            (&mut cfg.features.enable_user_auth, "ENABLE_USER_AUTH"),
            (&mut cfg.features.enable_voice_flow, "ENABLE_VOICE_FLOW"),
        ] {
            if let Ok(v) = std::env::var(env_name) {
                *flag = v == "true" || v == "1";
            }
        }

        Ok(cfg)
    }

    pub fn is_development(&self) -> bool {
        self.observability.log_level == "debug" || self.observability.log_level == "trace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_pool_target_of_ten() {
        let cfg = Config::default();
        assert_eq!(cfg.database.max_connections, 10);
    }

    #[test]
    fn default_feature_flags_enable_ai_proxy_and_plugin_api() {
        let flags = FeatureFlags::default();
        assert!(flags.enable_ai_proxy);
        assert!(flags.enable_plugin_api);
        assert!(!flags.enable_user_auth);
        assert!(!flags.enable_voice_flow);
    }
}
