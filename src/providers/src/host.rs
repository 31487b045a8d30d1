//! Host provider client (§4.1 "Host", §4.3 `creating_site`/`waiting_for_site`/
//! `mapping_domain`).

use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::http::shared_client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Defaults named in §4.3 `creating_site`.
pub const DEFAULT_WP_VERSION: &str = "6.8.1";
pub const DEFAULT_PHP_VERSION: &str = "8.0";
pub const DEFAULT_PLAN_ID: u32 = 2;

/// `waiting_for_site` budget/interval/probe-count (§4.3).
pub const READY_BUDGET: Duration = Duration::from_secs(300);
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const READY_PROBE_RETRIES: u32 = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSiteOptions {
    pub domain: String,
    pub site_name: String,
    pub wp_version: String,
    pub php_version: String,
    pub plan_id: u32,
    pub is_reserved: bool,
}

impl CreateSiteOptions {
    /// `site_name` defaults to the domain with `.` replaced by `-` when the
    /// caller does not supply one (§4.3 `creating_site`).
    pub fn new(domain: impl Into<String>, site_name: Option<String>) -> Self {
        let domain = domain.into();
        let site_name = site_name.unwrap_or_else(|| domain.replace('.', "-"));
        Self {
            domain,
            site_name,
            wp_version: DEFAULT_WP_VERSION.to_string(),
            php_version: DEFAULT_PHP_VERSION.to_string(),
            plan_id: DEFAULT_PLAN_ID,
            is_reserved: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteCredentials {
    pub id: String,
    pub wp_url: String,
    pub wp_username: String,
    pub wp_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteReadiness {
    Ready,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDomainOptions {
    pub www: bool,
    pub route_www: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDomainResult {
    pub a_records: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SslStatus {
    pub enabled: bool,
    pub status: String,
}

#[async_trait]
pub trait Host: Send + Sync {
    async fn create_site(&self, options: &CreateSiteOptions) -> ProviderResult<SiteCredentials>;

    /// Whether `mapDomain` on re-invocation is idempotent on the host side is
    /// not documented upstream; this client makes no assumption beyond
    /// calling it once per workflow run (see DESIGN.md Open Question #1).
    async fn wait_until_ready(
        &self,
        id: &str,
        budget: Duration,
        interval: Duration,
    ) -> ProviderResult<SiteCredentials>;

    async fn map_domain(
        &self,
        site_id: &str,
        domain: &str,
        opts: &MapDomainOptions,
    ) -> ProviderResult<MapDomainResult>;

    async fn check_ssl_status(&self, id: &str) -> ProviderResult<SslStatus>;
}

pub struct InstaWpHost {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl InstaWpHost {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: shared_client(),
            base_url: "https://api.instawp.io/api/v2".to_string(),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.api_key)
    }

    async fn get_status(&self, id: &str) -> ProviderResult<Value> {
        let resp = self
            .authed(self.http.get(format!("{}/sites/{id}", self.base_url)))
            .send()
            .await?;
        parse_host_response(resp).await
    }
}

async fn parse_host_response(resp: reqwest::Response) -> ProviderResult<Value> {
    let status = resp.status();
    if status.as_u16() == 401 {
        return Err(ProviderError::new(ProviderErrorKind::Auth, "instawp auth rejected")
            .with_status(401));
    }
    if status.as_u16() == 404 {
        return Err(ProviderError::new(ProviderErrorKind::NotFound, "site not found").with_status(404));
    }
    if status.as_u16() == 429 {
        return Err(ProviderError::new(ProviderErrorKind::RateLimited, "instawp rate limited")
            .with_status(429));
    }
    if !status.is_success() {
        return Err(ProviderError::upstream_failure(format!("instawp returned {status}"))
            .with_status(status.as_u16()));
    }
    resp.json().await.map_err(ProviderError::from)
}

/// Numeric `0` or the literal strings `active`/`running` count as ready.
fn is_ready_status(value: &Value) -> bool {
    match value.get("status") {
        Some(Value::Number(n)) => n.as_i64() == Some(0),
        Some(Value::String(s)) => s == "active" || s == "running",
        _ => false,
    }
}

#[async_trait]
impl Host for InstaWpHost {
    async fn create_site(&self, options: &CreateSiteOptions) -> ProviderResult<SiteCredentials> {
        let resp = self
            .authed(self.http.post(format!("{}/sites", self.base_url)).json(&json!({
                "site_name": options.site_name,
                "wp_version": options.wp_version,
                "php_version": options.php_version,
                "plan_id": options.plan_id,
                "is_reserved": options.is_reserved,
            })))
            .send()
            .await?;
        let value = parse_host_response(resp).await?;

        Ok(SiteCredentials {
            id: value["id"].as_str().unwrap_or_default().to_string(),
            wp_url: value["wp_url"].as_str().unwrap_or_default().to_string(),
            wp_username: value["wp_username"].as_str().unwrap_or_default().to_string(),
            wp_password: value["wp_password"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn wait_until_ready(
        &self,
        id: &str,
        budget: Duration,
        interval: Duration,
    ) -> ProviderResult<SiteCredentials> {
        let deadline = tokio::time::Instant::now() + budget;

        loop {
            let value = self.get_status(id).await?;
            if is_ready_status(&value) {
                let credentials = SiteCredentials {
                    id: id.to_string(),
                    wp_url: value["wp_url"].as_str().unwrap_or_default().to_string(),
                    wp_username: value["wp_username"].as_str().unwrap_or_default().to_string(),
                    wp_password: value["wp_password"].as_str().unwrap_or_default().to_string(),
                };
                return self.confirm_reachable(credentials).await;
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(ProviderError::new(
                    ProviderErrorKind::UpstreamFailure,
                    "site did not become ready within budget",
                ));
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn map_domain(
        &self,
        site_id: &str,
        domain: &str,
        opts: &MapDomainOptions,
    ) -> ProviderResult<MapDomainResult> {
        let resp = self
            .authed(
                self.http
                    .post(format!("{}/sites/{site_id}/map-domain", self.base_url))
                    .json(&json!({
                        "domain": domain,
                        "www": opts.www,
                        "route_www": opts.route_www,
                    })),
            )
            .send()
            .await?;
        let value = parse_host_response(resp).await?;

        let a_records = value["a_records"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(MapDomainResult { a_records })
    }

    async fn check_ssl_status(&self, id: &str) -> ProviderResult<SslStatus> {
        let resp = self
            .authed(self.http.get(format!("{}/sites/{id}/ssl", self.base_url)))
            .send()
            .await?;
        let value = parse_host_response(resp).await?;

        Ok(SslStatus {
            enabled: value["enabled"].as_bool().unwrap_or(false),
            status: value["status"].as_str().unwrap_or("unknown").to_string(),
        })
    }
}

impl InstaWpHost {
    /// Once the API reports ready, HEAD-probe the site URL up to
    /// `READY_PROBE_RETRIES` times accepting any response under 400; after
    /// that many failures the API's word is trusted (DNS/TLS may still be
    /// propagating).
    async fn confirm_reachable(&self, credentials: SiteCredentials) -> ProviderResult<SiteCredentials> {
        for attempt in 1..=READY_PROBE_RETRIES {
            match self.http.head(&credentials.wp_url).send().await {
                Ok(resp) if resp.status().as_u16() < 400 => return Ok(credentials),
                Ok(resp) => debug!(attempt, status = %resp.status(), "probe not yet healthy"),
                Err(err) => debug!(attempt, error = %err, "probe failed"),
            }
        }
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_name_defaults_from_domain_with_dots_replaced() {
        let options = CreateSiteOptions::new("alpha.example", None);
        assert_eq!(options.site_name, "alpha-example");
    }

    #[test]
    fn explicit_site_name_is_kept() {
        let options = CreateSiteOptions::new("alpha.example", Some("custom".to_string()));
        assert_eq!(options.site_name, "custom");
    }

    #[test]
    fn numeric_zero_status_is_ready() {
        assert!(is_ready_status(&json!({ "status": 0 })));
        assert!(!is_ready_status(&json!({ "status": 1 })));
    }

    #[test]
    fn literal_active_and_running_are_ready() {
        assert!(is_ready_status(&json!({ "status": "active" })));
        assert!(is_ready_status(&json!({ "status": "running" })));
        assert!(!is_ready_status(&json!({ "status": "provisioning" })));
    }
}
