//! Shared application state (teacher's `AppState`-holds-provider-clients
//! pattern, generalized to this spec's component set).

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use wts_editor::store::Store as EditorStore;
use wts_editor::EditSessionExecutor;
use wts_proxy::pipeline::Vendors as ProxyVendors;
use wts_proxy::store::Store as ProxyStore;
use wts_providers::ai::{AnthropicVendor, GeminiVendor, OpenAiVendor};
use wts_providers::dns::CloudflareDns;
use wts_providers::host::InstaWpHost;
use wts_providers::registrar::NamecheapRegistrar;
use wts_providers::scraper::FirecrawlScraper;
use wts_providers::site::WordPressSiteClient;
use wts_providers::{AiVendor, DnsProvider, Host, Registrar, Scraper, SiteClient};
use wts_workflows::catalog::HttpCatalogLoader;
use wts_workflows::{CatalogCache, DomainSiteWorkflowContext, OnboardingContext};

use crate::config::Config;
use crate::error::Result;

/// Indicates whether Postgres was reachable at startup. The gateway still
/// serves provisioning/onboarding/editor traffic without it (those never
/// touch a database); only the proxy's admin surface and editor session
/// persistence require it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Full,
    Degraded,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub mode: AppMode,
    pub domain_site_ctx: Arc<DomainSiteWorkflowContext>,
    pub onboarding_ctx: Arc<OnboardingContext>,
    pub proxy_store: Arc<dyn ProxyStore>,
    pub proxy_vendors: Arc<ProxyVendors>,
    pub editor_store: Arc<dyn EditorStore>,
    pub site_client: Arc<dyn SiteClient>,
    pub ai_openai: Arc<dyn AiVendor>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        info!("initializing gateway state");
        let pool = create_db_pool(&config).await;
        let mode = if pool.is_some() { AppMode::Full } else { AppMode::Degraded };

        Self::build(config, pool, mode).await
    }

    /// Builds state without attempting a database connection, used in
    /// tests and in environments that only exercise provisioning/onboarding.
    pub async fn new_degraded(config: Config) -> Result<Self> {
        Self::build(config, None, AppMode::Degraded).await
    }

    async fn build(config: Config, pool: Option<PgPool>, mode: AppMode) -> Result<Self> {
        let creds = &config.providers;

        let registrar: Option<Arc<dyn Registrar>> = match (&creds.namecheap_api_key, &creds.namecheap_username) {
            (Some(key), Some(user)) => Some(Arc::new(NamecheapRegistrar::new(
                key.clone(),
                user.clone(),
                creds.namecheap_client_ip.clone().unwrap_or_default(),
                creds.namecheap_sandbox,
            ))),
            _ => None,
        };

        let dns: Option<Arc<dyn DnsProvider>> = match (&creds.cloudflare_api_key, &creds.cloudflare_email) {
            (Some(key), Some(email)) => {
                Some(Arc::new(CloudflareDns::new(
                    key.clone(),
                    email.clone(),
                    creds.cloudflare_account_id.clone().unwrap_or_default(),
                )))
            }
            _ => None,
        };

        let host: Option<Arc<dyn Host>> =
            creds.insta_wp_api_key.clone().map(|key| Arc::new(InstaWpHost::new(key)) as Arc<dyn Host>);

        let site_client: Arc<dyn SiteClient> = Arc::new(WordPressSiteClient::new());

        let openai: Arc<dyn AiVendor> =
            Arc::new(OpenAiVendor::new(creds.openai_api_key.clone().unwrap_or_default()));
        let gemini: Arc<dyn AiVendor> =
            Arc::new(GeminiVendor::new(creds.gemini_api_key.clone().unwrap_or_default()));
        let anthropic: Arc<dyn AiVendor> =
            Arc::new(AnthropicVendor::new(creds.anthropic_api_key.clone().unwrap_or_default()));

        let ai_for_workflows: Option<Arc<dyn AiVendor>> = creds.openai_api_key.clone().map(|_| openai.clone());

        let scraper: Arc<dyn Scraper> = Arc::new(FirecrawlScraper::new(creds.firecrawl_api_key.clone()));

        let catalog = Arc::new(CatalogCache::new(Arc::new(HttpCatalogLoader::new(
            "https://templates.wts.dev/catalog".to_string(),
        ))));

        let domain_site_ctx = Arc::new(DomainSiteWorkflowContext {
            registrar,
            dns,
            host,
            site: site_client.clone(),
            ai: ai_for_workflows.clone(),
            default_contact: None,
            cancellation: tokio_util::sync::CancellationToken::new(),
        });

        let onboarding_ctx = Arc::new(OnboardingContext {
            scraper,
            ai: ai_for_workflows,
            catalog,
            cancellation: tokio_util::sync::CancellationToken::new(),
        });

        let proxy_vendors = Arc::new(ProxyVendors {
            openai: openai.clone(),
            gemini,
            anthropic,
        });

        let (proxy_store, editor_store): (Arc<dyn ProxyStore>, Arc<dyn EditorStore>) = match &pool {
            Some(pool) => (
                Arc::new(wts_proxy::store::PostgresStore::new(pool.clone())),
                Arc::new(wts_editor::store::PostgresStore::new(pool.clone())),
            ),
            None => {
                warn!("no database configured; proxy and editor endpoints will report 500s for persisted operations");
                (
                    Arc::new(wts_proxy::store::test_support::InMemoryStore::new()),
                    Arc::new(wts_editor::store::test_support::InMemoryStore::new()),
                )
            }
        };

        Ok(Self {
            config,
            mode,
            domain_site_ctx,
            onboarding_ctx,
            proxy_store,
            proxy_vendors,
            editor_store,
            site_client,
            ai_openai: openai,
        })
    }

    pub fn editor_executor(&self) -> EditSessionExecutor {
        EditSessionExecutor::new(self.editor_store.clone(), self.site_client.clone(), self.ai_openai.clone())
    }

    pub async fn is_healthy(&self) -> bool {
        self.mode == AppMode::Full
    }
}

async fn create_db_pool(config: &Config) -> Option<PgPool> {
    match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => Some(pool),
        Err(err) => {
            warn!(error = %err, "database unreachable at startup, continuing in degraded mode");
            None
        }
    }
}
