//! Persistence for the proxy's tenancy model (§6 normative schemas,
//! `proxy_sites`/`proxy_subscription_tiers`/`proxy_request_log`).
//!
//! `Store` is a trait rather than a bare `PgPool` so the pipeline in
//! [`crate::pipeline`] is exercisable against an in-memory double without a
//! live database (teacher's `AppState`-holds-`Option<PgPool>` pattern,
//! generalized).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use wts_shared::types::SubscriptionTier;

use crate::error::ProxyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    Active,
    Revoked,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Active => "active",
            SiteStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SiteStatus::Active),
            "revoked" => Some(SiteStatus::Revoked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProxySite {
    pub id: Uuid,
    pub domain: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub label: Option<String>,
    pub status: String,
    pub subscription_tier: String,
    pub monthly_token_limit: i64,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProxySubscriptionTier {
    pub tier: String,
    pub display_name: String,
    pub monthly_token_limit: i64,
    pub allowed_models: Vec<String>,
    pub rate_limit_rpm: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProxyRequestLog {
    pub id: i64,
    pub site_id: Uuid,
    pub domain: String,
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub method: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub total_tokens: i32,
    pub response_status: i32,
    pub latency_ms: i32,
    pub error_message: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// New-row shape for a log insert; `requested_at` is set by the store, not
/// the caller, so quota-window semantics stay authoritative to one clock.
#[derive(Debug, Clone)]
pub struct NewRequestLog {
    pub site_id: Uuid,
    pub domain: String,
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub method: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub total_tokens: i32,
    pub response_status: i32,
    pub latency_ms: i32,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UsageSnapshot {
    pub used: i64,
    pub limit: i64,
}

impl UsageSnapshot {
    pub fn remaining(&self) -> i64 {
        (self.limit - self.used).max(0)
    }
}

/// Persistence seam for the proxy's tenancy data. Implementations must
/// serialize per-site mutations (§5: `SELECT ... FOR UPDATE` or an
/// equivalent single-writer guarantee) since sites are mutated concurrently
/// across gateway replicas.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_site(
        &self,
        domain: &str,
        api_key: &str,
        label: Option<String>,
        tier: SubscriptionTier,
    ) -> Result<ProxySite, ProxyError>;

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<ProxySite>, ProxyError>;

    async fn get_site(&self, id: Uuid) -> Result<Option<ProxySite>, ProxyError>;

    async fn list_sites(&self) -> Result<Vec<ProxySite>, ProxyError>;

    async fn rotate_key(&self, id: Uuid, new_key: &str) -> Result<ProxySite, ProxyError>;

    /// Updates tier and/or status. `None` leaves the field unchanged.
    async fn update_site(
        &self,
        id: Uuid,
        tier: Option<SubscriptionTier>,
        status: Option<SiteStatus>,
    ) -> Result<ProxySite, ProxyError>;

    async fn get_tier_policy(&self, tier: SubscriptionTier) -> Result<Option<ProxySubscriptionTier>, ProxyError>;

    /// Sum of `total_tokens` for rows with `requested_at` in the current
    /// calendar month (§4.6 step 2).
    async fn usage_this_month(&self, site_id: Uuid) -> Result<i64, ProxyError>;

    async fn insert_log(&self, entry: NewRequestLog) -> Result<(), ProxyError>;

    async fn list_logs(&self, site_id: Uuid, limit: i64, offset: i64) -> Result<Vec<ProxyRequestLog>, ProxyError>;
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_site(
        &self,
        domain: &str,
        api_key: &str,
        label: Option<String>,
        tier: SubscriptionTier,
    ) -> Result<ProxySite, ProxyError> {
        let policy = self.get_tier_policy(tier).await?;
        let limit = policy.map(|p| p.monthly_token_limit).unwrap_or(100_000);

        let site = sqlx::query_as::<_, ProxySite>(
            "INSERT INTO proxy_sites (id, domain, api_key, label, status, subscription_tier, monthly_token_limit, created_at) \
             VALUES ($1, $2, $3, $4, 'active', $5, $6, now()) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(domain)
        .bind(api_key)
        .bind(label)
        .bind(tier.as_str())
        .bind(limit)
        .fetch_one(&self.pool)
        .await?;
        Ok(site)
    }

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<ProxySite>, ProxyError> {
        let site = sqlx::query_as::<_, ProxySite>(
            "SELECT * FROM proxy_sites WHERE api_key = $1 AND status = 'active'",
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(site)
    }

    async fn get_site(&self, id: Uuid) -> Result<Option<ProxySite>, ProxyError> {
        let site = sqlx::query_as::<_, ProxySite>("SELECT * FROM proxy_sites WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    async fn list_sites(&self) -> Result<Vec<ProxySite>, ProxyError> {
        let sites = sqlx::query_as::<_, ProxySite>("SELECT * FROM proxy_sites ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(sites)
    }

    async fn rotate_key(&self, id: Uuid, new_key: &str) -> Result<ProxySite, ProxyError> {
        let mut tx = self.pool.begin().await?;
        let site = sqlx::query_as::<_, ProxySite>(
            "UPDATE proxy_sites SET api_key = $1 WHERE id = $2 RETURNING *",
        )
        .bind(new_key)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ProxyError::NotFound("site".to_string()))?;
        tx.commit().await?;
        Ok(site)
    }

    async fn update_site(
        &self,
        id: Uuid,
        tier: Option<SubscriptionTier>,
        status: Option<SiteStatus>,
    ) -> Result<ProxySite, ProxyError> {
        // Row-level serialization per §5: lock, then apply only the
        // parameterized fields the caller asked to change (Open Question #3
        // — no string interpolation of column values).
        let mut tx = self.pool.begin().await?;
        let _locked = sqlx::query_as::<_, ProxySite>("SELECT * FROM proxy_sites WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ProxyError::NotFound("site".to_string()))?;

        if let Some(tier) = tier {
            let policy = self.get_tier_policy(tier).await?;
            let limit = policy.map(|p| p.monthly_token_limit).unwrap_or(100_000);
            sqlx::query(
                "UPDATE proxy_sites SET subscription_tier = $1, monthly_token_limit = $2 WHERE id = $3",
            )
            .bind(tier.as_str())
            .bind(limit)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(status) = status {
            let revoked_at_clause = match status {
                SiteStatus::Revoked => "revoked_at = now()",
                SiteStatus::Active => "revoked_at = NULL",
            };
            let query = format!("UPDATE proxy_sites SET status = $1, {revoked_at_clause} WHERE id = $2");
            sqlx::query(&query)
                .bind(status.as_str())
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let updated = sqlx::query_as::<_, ProxySite>("SELECT * FROM proxy_sites WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn get_tier_policy(&self, tier: SubscriptionTier) -> Result<Option<ProxySubscriptionTier>, ProxyError> {
        let policy = sqlx::query_as::<_, ProxySubscriptionTier>(
            "SELECT * FROM proxy_subscription_tiers WHERE tier = $1",
        )
        .bind(tier.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(policy)
    }

    async fn usage_this_month(&self, site_id: Uuid) -> Result<i64, ProxyError> {
        let used: Option<i64> = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_tokens), 0) FROM proxy_request_log \
             WHERE site_id = $1 AND requested_at >= date_trunc('month', now())",
        )
        .bind(site_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(used.unwrap_or(0))
    }

    async fn insert_log(&self, entry: NewRequestLog) -> Result<(), ProxyError> {
        sqlx::query(
            "INSERT INTO proxy_request_log \
             (site_id, domain, provider, model, endpoint, method, prompt_tokens, completion_tokens, \
              total_tokens, response_status, latency_ms, error_message, requested_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())",
        )
        .bind(entry.site_id)
        .bind(entry.domain)
        .bind(entry.provider)
        .bind(entry.model)
        .bind(entry.endpoint)
        .bind(entry.method)
        .bind(entry.prompt_tokens)
        .bind(entry.completion_tokens)
        .bind(entry.total_tokens)
        .bind(entry.response_status)
        .bind(entry.latency_ms)
        .bind(entry.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_logs(&self, site_id: Uuid, limit: i64, offset: i64) -> Result<Vec<ProxyRequestLog>, ProxyError> {
        let logs = sqlx::query_as::<_, ProxyRequestLog>(
            "SELECT * FROM proxy_request_log WHERE site_id = $1 ORDER BY requested_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(site_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory `Store` double (§4.6: "testable against an in-memory Store
    /// impl without a real database").
    #[derive(Default)]
    pub struct InMemoryStore {
        sites: Mutex<HashMap<Uuid, ProxySite>>,
        tiers: Mutex<HashMap<String, ProxySubscriptionTier>>,
        logs: Mutex<Vec<ProxyRequestLog>>,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            let mut tiers = HashMap::new();
            tiers.insert(
                "free".to_string(),
                ProxySubscriptionTier {
                    tier: "free".to_string(),
                    display_name: "Free".to_string(),
                    monthly_token_limit: 100_000,
                    allowed_models: vec!["gpt-4o-mini".to_string(), "gemini-2.0-flash".to_string()],
                    rate_limit_rpm: 10,
                },
            );
            tiers.insert(
                "starter".to_string(),
                ProxySubscriptionTier {
                    tier: "starter".to_string(),
                    display_name: "Starter".to_string(),
                    monthly_token_limit: 1_000_000,
                    allowed_models: vec![
                        "gpt-4o-mini".to_string(),
                        "gpt-4o".to_string(),
                        "gemini-2.0-flash".to_string(),
                    ],
                    rate_limit_rpm: 30,
                },
            );
            tiers.insert(
                "pro".to_string(),
                ProxySubscriptionTier {
                    tier: "pro".to_string(),
                    display_name: "Pro".to_string(),
                    monthly_token_limit: 10_000_000,
                    allowed_models: vec![
                        "gpt-4o-mini".to_string(),
                        "gpt-4o".to_string(),
                        "gemini-2.0-flash".to_string(),
                        "claude-opus-4-6".to_string(),
                    ],
                    rate_limit_rpm: 120,
                },
            );
            tiers.insert(
                "enterprise".to_string(),
                ProxySubscriptionTier {
                    tier: "enterprise".to_string(),
                    display_name: "Enterprise".to_string(),
                    monthly_token_limit: 100_000_000,
                    allowed_models: vec![
                        "gpt-4o-mini".to_string(),
                        "gpt-4o".to_string(),
                        "gemini-2.0-flash".to_string(),
                        "claude-opus-4-6".to_string(),
                    ],
                    rate_limit_rpm: 600,
                },
            );
            Self {
                sites: Mutex::new(HashMap::new()),
                tiers: Mutex::new(tiers),
                logs: Mutex::new(Vec::new()),
            }
        }

        /// Seeds a site directly, bypassing key generation, for scenario
        /// tests that need a known key/usage.
        pub async fn seed_site(&self, site: ProxySite) {
            self.sites.lock().await.insert(site.id, site);
        }

        pub async fn seed_logs(&self, entries: Vec<ProxyRequestLog>) {
            self.logs.lock().await.extend(entries);
        }
    }

    #[async_trait]
    impl Store for InMemoryStore {
        async fn create_site(
            &self,
            domain: &str,
            api_key: &str,
            label: Option<String>,
            tier: SubscriptionTier,
        ) -> Result<ProxySite, ProxyError> {
            let limit = self
                .tiers
                .lock()
                .await
                .get(tier.as_str())
                .map(|p| p.monthly_token_limit)
                .unwrap_or(100_000);
            let site = ProxySite {
                id: Uuid::new_v4(),
                domain: domain.to_string(),
                api_key: api_key.to_string(),
                label,
                status: SiteStatus::Active.as_str().to_string(),
                subscription_tier: tier.as_str().to_string(),
                monthly_token_limit: limit,
                created_at: Utc::now(),
                revoked_at: None,
            };
            self.sites.lock().await.insert(site.id, site.clone());
            Ok(site)
        }

        async fn find_by_api_key(&self, api_key: &str) -> Result<Option<ProxySite>, ProxyError> {
            Ok(self
                .sites
                .lock()
                .await
                .values()
                .find(|s| s.api_key == api_key && s.status == SiteStatus::Active.as_str())
                .cloned())
        }

        async fn get_site(&self, id: Uuid) -> Result<Option<ProxySite>, ProxyError> {
            Ok(self.sites.lock().await.get(&id).cloned())
        }

        async fn list_sites(&self) -> Result<Vec<ProxySite>, ProxyError> {
            Ok(self.sites.lock().await.values().cloned().collect())
        }

        async fn rotate_key(&self, id: Uuid, new_key: &str) -> Result<ProxySite, ProxyError> {
            let mut sites = self.sites.lock().await;
            let site = sites.get_mut(&id).ok_or_else(|| ProxyError::NotFound("site".to_string()))?;
            site.api_key = new_key.to_string();
            Ok(site.clone())
        }

        async fn update_site(
            &self,
            id: Uuid,
            tier: Option<SubscriptionTier>,
            status: Option<SiteStatus>,
        ) -> Result<ProxySite, ProxyError> {
            let limit = if let Some(tier) = tier {
                self.tiers.lock().await.get(tier.as_str()).map(|p| p.monthly_token_limit)
            } else {
                None
            };
            let mut sites = self.sites.lock().await;
            let site = sites.get_mut(&id).ok_or_else(|| ProxyError::NotFound("site".to_string()))?;
            if let Some(tier) = tier {
                site.subscription_tier = tier.as_str().to_string();
                if let Some(limit) = limit {
                    site.monthly_token_limit = limit;
                }
            }
            if let Some(status) = status {
                site.status = status.as_str().to_string();
                site.revoked_at = match status {
                    SiteStatus::Revoked => Some(Utc::now()),
                    SiteStatus::Active => None,
                };
            }
            Ok(site.clone())
        }

        async fn get_tier_policy(&self, tier: SubscriptionTier) -> Result<Option<ProxySubscriptionTier>, ProxyError> {
            Ok(self.tiers.lock().await.get(tier.as_str()).cloned())
        }

        async fn usage_this_month(&self, site_id: Uuid) -> Result<i64, ProxyError> {
            let month_start = Utc::now().date_naive().format("%Y-%m").to_string();
            let used = self
                .logs
                .lock()
                .await
                .iter()
                .filter(|l| l.site_id == site_id && l.requested_at.format("%Y-%m").to_string() == month_start)
                .map(|l| l.total_tokens as i64)
                .sum();
            Ok(used)
        }

        async fn insert_log(&self, entry: NewRequestLog) -> Result<(), ProxyError> {
            let mut logs = self.logs.lock().await;
            let id = logs.len() as i64 + 1;
            logs.push(ProxyRequestLog {
                id,
                site_id: entry.site_id,
                domain: entry.domain,
                provider: entry.provider,
                model: entry.model,
                endpoint: entry.endpoint,
                method: entry.method,
                prompt_tokens: entry.prompt_tokens,
                completion_tokens: entry.completion_tokens,
                total_tokens: entry.total_tokens,
                response_status: entry.response_status,
                latency_ms: entry.latency_ms,
                error_message: entry.error_message,
                requested_at: Utc::now(),
            });
            Ok(())
        }

        async fn list_logs(&self, site_id: Uuid, limit: i64, offset: i64) -> Result<Vec<ProxyRequestLog>, ProxyError> {
            let logs = self.logs.lock().await;
            Ok(logs
                .iter()
                .filter(|l| l.site_id == site_id)
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }
}
