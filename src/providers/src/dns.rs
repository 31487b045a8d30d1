//! DNS/TLS provider client (§4.1, §6 "DNS provider" wire format).
//!
//! Cloudflare-shaped: JSON over HTTPS authenticated with
//! `X-Auth-Email`/`X-Auth-Key` headers.

use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::http::shared_client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub zone_id: String,
    pub nameservers: Vec<String>,
}

#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn get_or_create_zone(&self, domain: &str) -> ProviderResult<Zone>;

    /// Idempotent: deletes any existing A records matching the apex (and
    /// `www` if `include_www`) before re-creating them proxied.
    async fn set_a_records(
        &self,
        zone_id: &str,
        name: &str,
        ips: &[String],
        include_www: bool,
    ) -> ProviderResult<()>;

    /// Best-effort: per-setting failures are logged, not surfaced.
    async fn configure_security(&self, zone_id: &str) -> ProviderResult<()>;
}

/// Fixed security/performance defaults applied by `configure_security`.
const SECURITY_SETTINGS: &[(&str, &str)] = &[
    ("always_use_https", "on"),
    ("ssl", "full"),
    ("min_tls_version", "1.2"),
    ("automatic_https_rewrites", "on"),
    ("brotli", "on"),
];

pub struct CloudflareDns {
    api_key: String,
    email: String,
    account_id: String,
    http: reqwest::Client,
    base_url: String,
}

impl CloudflareDns {
    pub fn new(api_key: String, email: String, account_id: String) -> Self {
        Self {
            api_key,
            email,
            account_id,
            http: shared_client(),
            base_url: "https://api.cloudflare.com/client/v4".to_string(),
        }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("X-Auth-Email", &self.email)
            .header("X-Auth-Key", &self.api_key)
            .header("Content-Type", "application/json")
    }

    async fn get_json(&self, path: &str) -> ProviderResult<Value> {
        let resp = self
            .auth(self.http.get(format!("{}{}", self.base_url, path)))
            .send()
            .await?;
        parse_cf_response(resp).await
    }

    async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Value,
    ) -> ProviderResult<Value> {
        let resp = self
            .auth(
                self.http
                    .request(method, format!("{}{}", self.base_url, path))
                    .json(&body),
            )
            .send()
            .await?;
        parse_cf_response(resp).await
    }
}

async fn parse_cf_response(resp: reqwest::Response) -> ProviderResult<Value> {
    let status = resp.status();
    if status.as_u16() == 429 {
        return Err(ProviderError::new(ProviderErrorKind::RateLimited, "cloudflare rate limited")
            .with_status(429));
    }
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(ProviderError::new(ProviderErrorKind::Auth, "cloudflare auth rejected")
            .with_status(status.as_u16()));
    }

    let value: Value = resp.json().await.map_err(ProviderError::from)?;
    let success = value.get("success").and_then(Value::as_bool).unwrap_or(false);
    if !success {
        let message = value["errors"]
            .as_array()
            .and_then(|errs| errs.first())
            .and_then(|e| e["message"].as_str())
            .unwrap_or("unknown cloudflare error")
            .to_string();
        return Err(ProviderError::upstream_invalid(message));
    }
    Ok(value)
}

#[async_trait]
impl DnsProvider for CloudflareDns {
    async fn get_or_create_zone(&self, domain: &str) -> ProviderResult<Zone> {
        let existing = self
            .get_json(&format!("/zones?name={}", urlencoding::encode(domain)))
            .await?;

        if let Some(zone) = existing["result"].as_array().and_then(|r| r.first()) {
            return Ok(zone_from_json(zone));
        }

        let created = self
            .send_json(
                reqwest::Method::POST,
                "/zones",
                json!({ "name": domain, "account": { "id": self.account_id } }),
            )
            .await?;

        Ok(zone_from_json(&created["result"]))
    }

    async fn set_a_records(
        &self,
        zone_id: &str,
        name: &str,
        ips: &[String],
        include_www: bool,
    ) -> ProviderResult<()> {
        let mut targets = vec![name.to_string()];
        if include_www {
            targets.push(format!("www.{name}"));
        }

        for target in &targets {
            let existing = self
                .get_json(&format!(
                    "/zones/{zone_id}/dns_records?type=A&name={}",
                    urlencoding::encode(target)
                ))
                .await?;

            if let Some(records) = existing["result"].as_array() {
                for record in records {
                    if let Some(id) = record["id"].as_str() {
                        self.send_json(
                            reqwest::Method::DELETE,
                            &format!("/zones/{zone_id}/dns_records/{id}"),
                            json!({}),
                        )
                        .await?;
                    }
                }
            }

            for ip in ips {
                self.send_json(
                    reqwest::Method::POST,
                    &format!("/zones/{zone_id}/dns_records"),
                    json!({
                        "type": "A",
                        "name": target,
                        "content": ip,
                        "proxied": true,
                        "ttl": 1,
                    }),
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn configure_security(&self, zone_id: &str) -> ProviderResult<()> {
        for (setting, value) in SECURITY_SETTINGS {
            let result = self
                .send_json(
                    reqwest::Method::PATCH,
                    &format!("/zones/{zone_id}/settings/{setting}"),
                    json!({ "value": value }),
                )
                .await;

            if let Err(err) = result {
                warn!(setting, error = %err.vendor_message, "security setting failed, continuing");
            }
        }
        Ok(())
    }
}

fn zone_from_json(value: &Value) -> Zone {
    let zone_id = value["id"].as_str().unwrap_or_default().to_string();
    let nameservers = value["name_servers"]
        .as_array()
        .map(|ns| {
            ns.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    Zone { zone_id, nameservers }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_from_json_extracts_nameservers() {
        let value = json!({
            "id": "z1",
            "name_servers": ["ns1.example.com", "ns2.example.com"],
        });
        let zone = zone_from_json(&value);
        assert_eq!(zone.zone_id, "z1");
        assert_eq!(zone.nameservers.len(), 2);
    }
}
