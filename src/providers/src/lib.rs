//! Typed clients for every external provider the platform orchestrates:
//! domain registrar, DNS/TLS, WordPress host, content scraper, and AI
//! vendors. Each client maps vendor-specific failures onto [`ProviderError`]
//! so callers branch on [`ProviderErrorKind`] rather than HTTP status codes.

pub mod ai;
pub mod dns;
pub mod error;
pub mod host;
pub mod http;
pub mod registrar;
pub mod retry;
pub mod scraper;
pub mod site;

pub use ai::{AiVendor, ChatMessage, ChatRequest, ChatRole, Usage, VendorResponse};
pub use dns::{CloudflareDns, DnsProvider, Zone};
pub use error::{ProviderError, ProviderErrorKind, ProviderResult};
pub use host::{CreateSiteOptions, Host, InstaWpHost, MapDomainOptions, MapDomainResult, SiteCredentials, SslStatus};
pub use registrar::{CheckResult, Contact, NamecheapRegistrar, RegisterResult, Registrar};
pub use retry::with_backoff;
pub use scraper::{FirecrawlScraper, ScrapedPage, Scraper};
pub use site::{MediaAsset, PageInput, PageRecord, PageUpdate, SiteClient, SiteSettings, WordPressSiteClient};
