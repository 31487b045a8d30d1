//! Template catalog cache (§4.4, §9 "Global mutable caches" redesign).
//!
//! Process-scoped, read-mostly, with a 1 h TTL and a single-flight refresh
//! guard so concurrent onboarding runs don't all hit the base-site endpoint
//! at once. Tests inject a pre-seeded catalog via [`CatalogCache::seeded`]
//! instead of going through the refresh path.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;
use wts_providers::ProviderError;

const TTL: Duration = Duration::from_secs(60 * 60);

/// Hardcoded one-entry fallback used when the catalog endpoint is
/// unreachable (matches S6).
pub const FALLBACK_SLUG: &str = "flexify";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateCatalogEntry {
    pub slug: String,
    pub industries: Vec<String>,
    pub skin: Option<String>,
    pub variation: Option<String>,
}

fn fallback_catalog() -> Vec<TemplateCatalogEntry> {
    vec![TemplateCatalogEntry {
        slug: FALLBACK_SLUG.to_string(),
        industries: vec![],
        skin: None,
        variation: None,
    }]
}

struct CachedCatalog {
    fetched_at: Instant,
    entries: Vec<TemplateCatalogEntry>,
}

/// A loader capable of fetching the live catalog from the base-site
/// endpoint. Kept as a trait so tests can fail it deterministically.
#[async_trait::async_trait]
pub trait CatalogLoader: Send + Sync {
    async fn load(&self) -> Result<Vec<TemplateCatalogEntry>, ProviderError>;
}

pub struct HttpCatalogLoader {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpCatalogLoader {
    pub fn new(endpoint: String) -> Self {
        Self { endpoint, http: reqwest::Client::new() }
    }
}

#[async_trait::async_trait]
impl CatalogLoader for HttpCatalogLoader {
    async fn load(&self) -> Result<Vec<TemplateCatalogEntry>, ProviderError> {
        let resp = self.http.get(&self.endpoint).send().await?;
        if !resp.status().is_success() {
            return Err(ProviderError::upstream_failure(format!(
                "catalog endpoint returned {}",
                resp.status()
            )));
        }
        resp.json().await.map_err(ProviderError::from)
    }
}

pub struct CatalogCache {
    loader: Arc<dyn CatalogLoader>,
    state: RwLock<Option<CachedCatalog>>,
    refresh_lock: Mutex<()>,
}

impl CatalogCache {
    pub fn new(loader: Arc<dyn CatalogLoader>) -> Self {
        Self {
            loader,
            state: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Test-injectable constructor bypassing the network loader entirely.
    pub fn seeded(entries: Vec<TemplateCatalogEntry>) -> Self {
        struct NeverLoad;
        #[async_trait::async_trait]
        impl CatalogLoader for NeverLoad {
            async fn load(&self) -> Result<Vec<TemplateCatalogEntry>, ProviderError> {
                Err(ProviderError::upstream_failure("seeded cache has no loader"))
            }
        }

        Self {
            loader: Arc::new(NeverLoad),
            state: RwLock::new(Some(CachedCatalog { fetched_at: Instant::now(), entries })),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Returns the current catalog, refreshing on TTL expiry and falling
    /// back to the hardcoded entry on loader failure.
    pub async fn entries(&self) -> Vec<TemplateCatalogEntry> {
        if let Some(entries) = self.fresh_entries().await {
            return entries;
        }

        let _guard = self.refresh_lock.lock().await;
        // Re-check: another task may have refreshed while we waited.
        if let Some(entries) = self.fresh_entries().await {
            return entries;
        }

        match self.loader.load().await {
            Ok(entries) => {
                let mut state = self.state.write().await;
                *state = Some(CachedCatalog { fetched_at: Instant::now(), entries: entries.clone() });
                entries
            }
            Err(err) => {
                warn!(error = %err.vendor_message, "template catalog refresh failed, using fallback");
                fallback_catalog()
            }
        }
    }

    async fn fresh_entries(&self) -> Option<Vec<TemplateCatalogEntry>> {
        let state = self.state.read().await;
        state.as_ref().and_then(|cached| {
            if cached.fetched_at.elapsed() < TTL {
                Some(cached.entries.clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_cache_returns_entries_without_loading() {
        let cache = CatalogCache::seeded(vec![TemplateCatalogEntry {
            slug: "bistro".to_string(),
            industries: vec!["restaurant".to_string()],
            skin: None,
            variation: None,
        }]);
        let entries = cache.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].slug, "bistro");
    }

    #[tokio::test]
    async fn loader_failure_falls_back_to_flexify() {
        struct FailingLoader;
        #[async_trait::async_trait]
        impl CatalogLoader for FailingLoader {
            async fn load(&self) -> Result<Vec<TemplateCatalogEntry>, ProviderError> {
                Err(ProviderError::upstream_failure("endpoint down"))
            }
        }

        let cache = CatalogCache::new(Arc::new(FailingLoader));
        let entries = cache.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].slug, FALLBACK_SLUG);
    }
}
