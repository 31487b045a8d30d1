//! Shared HTTP client construction for provider clients.

use once_cell::sync::Lazy;
use std::time::Duration;

/// Default per-call deadline for outbound provider calls (§5).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// AI vendor calls get a longer deadline (§5).
pub const AI_VENDOR_TIMEOUT: Duration = Duration::from_secs(60);

static SHARED_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build shared reqwest client")
});

static AI_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(AI_VENDOR_TIMEOUT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build AI vendor reqwest client")
});

/// A process-wide client reused by registrar/DNS/host/scraper clients.
pub fn shared_client() -> reqwest::Client {
    SHARED_CLIENT.clone()
}

/// A process-wide client tuned for the longer AI vendor deadline.
pub fn ai_client() -> reqwest::Client {
    AI_CLIENT.clone()
}
