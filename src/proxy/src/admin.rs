//! Admin surface behind the static `x-proxy-admin-secret` header (§4.6,
//! §6). Handlers here return plain data; the secret check itself lives in
//! `wts-gateway` middleware, not this crate, so this module stays testable
//! without an HTTP stack.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wts_shared::types::SubscriptionTier;

use crate::error::ProxyError;
use crate::key;
use crate::store::{ProxyRequestLog, ProxySite, SiteStatus, Store, UsageSnapshot};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterSiteRequest {
    pub domain: String,
    pub label: Option<String>,
    pub tier: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterSiteResponse {
    #[serde(flatten)]
    pub site: ProxySite,
    /// Shown once, at creation/rotation time only (§6).
    pub api_key: String,
}

pub async fn register_site(store: &dyn Store, req: RegisterSiteRequest) -> Result<RegisterSiteResponse, ProxyError> {
    let tier = match req.tier {
        Some(ref name) => {
            SubscriptionTier::parse(name).ok_or_else(|| ProxyError::Validation(format!("unknown tier {name}")))?
        }
        None => SubscriptionTier::default(),
    };
    let api_key = key::generate();
    let site = store.create_site(&req.domain, &api_key, req.label, tier).await?;
    Ok(RegisterSiteResponse { site, api_key })
}

pub async fn rotate_key(store: &dyn Store, site_id: Uuid) -> Result<RegisterSiteResponse, ProxyError> {
    let new_key = key::generate();
    let site = store.rotate_key(site_id, &new_key).await?;
    Ok(RegisterSiteResponse { site, api_key: new_key })
}

pub async fn list_sites(store: &dyn Store) -> Result<Vec<ProxySite>, ProxyError> {
    store.list_sites().await
}

pub async fn get_usage(store: &dyn Store, site_id: Uuid) -> Result<UsageSnapshot, ProxyError> {
    crate::pipeline::usage_snapshot(store, site_id).await
}

pub async fn get_requests(
    store: &dyn Store,
    site_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProxyRequestLog>, ProxyError> {
    store.list_logs(site_id, limit, offset).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSiteRequest {
    pub tier: Option<String>,
    pub status: Option<String>,
}

/// Rejects an unrecognized tier name with a validation error rather than
/// falling through to a default (Open Question #2: the original throws on
/// an unknown tier; here that becomes an explicit 400 upstream in
/// `wts-gateway`, see DESIGN.md).
pub async fn update_site(store: &dyn Store, site_id: Uuid, req: UpdateSiteRequest) -> Result<ProxySite, ProxyError> {
    let tier = req
        .tier
        .map(|name| SubscriptionTier::parse(&name).ok_or_else(|| ProxyError::Validation(format!("unknown tier {name}"))))
        .transpose()?;
    let status = req
        .status
        .map(|name| SiteStatus::parse(&name).ok_or_else(|| ProxyError::Validation(format!("unknown status {name}"))))
        .transpose()?;
    store.update_site(site_id, tier, status).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::InMemoryStore;

    #[tokio::test]
    async fn register_site_returns_a_key_matching_the_contract_regex() {
        let store = InMemoryStore::new();
        let response = register_site(
            &store,
            RegisterSiteRequest {
                domain: "newsite.test".to_string(),
                label: None,
                tier: None,
            },
        )
        .await
        .unwrap();
        assert!(key::API_KEY_RE.is_match(&response.api_key));
        assert_eq!(response.site.subscription_tier, "free");
    }

    #[tokio::test]
    async fn unknown_tier_name_is_rejected() {
        let store = InMemoryStore::new();
        let result = register_site(
            &store,
            RegisterSiteRequest {
                domain: "newsite.test".to_string(),
                label: None,
                tier: Some("legendary".to_string()),
            },
        )
        .await;
        assert!(matches!(result, Err(ProxyError::Validation(_))));
    }

    #[tokio::test]
    async fn update_site_rejects_unknown_tier_on_patch() {
        let store = InMemoryStore::new();
        let registered = register_site(
            &store,
            RegisterSiteRequest {
                domain: "newsite.test".to_string(),
                label: None,
                tier: None,
            },
        )
        .await
        .unwrap();

        let result = update_site(
            &store,
            registered.site.id,
            UpdateSiteRequest {
                tier: Some("legendary".to_string()),
                status: None,
            },
        )
        .await;
        assert!(matches!(result, Err(ProxyError::Validation(_))));
    }
}
