//! Content scraper client (§4.1 "Scraper").
//!
//! Uses Firecrawl when `FIRECRAWL_API_KEY` is configured; otherwise falls
//! back to a native fetch-and-strip implementation so the onboarding
//! workflow's scrape step still degrades rather than hard-failing (§5
//! graceful degradation).

use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::http::shared_client;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub markdown: String,
    /// Raw HTML, kept alongside the markdown so callers that need
    /// pattern-matching (brand/logo/colour extraction) don't have to
    /// re-fetch the page (§4.1 "Scraper").
    pub html: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
    pub screenshot: Option<String>,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, url: &str) -> ProviderResult<ScrapedPage>;

    /// Non-goal for most workflows; only used when a caller explicitly
    /// needs more than the single landing page.
    async fn crawl(&self, url: &str, limit: u32) -> ProviderResult<Vec<ScrapedPage>>;
}

pub struct FirecrawlScraper {
    api_key: Option<String>,
    http: reqwest::Client,
    base_url: String,
}

impl FirecrawlScraper {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            http: shared_client(),
            base_url: "https://api.firecrawl.dev/v1".to_string(),
        }
    }

    async fn scrape_via_firecrawl(&self, url: &str, api_key: &str) -> ProviderResult<ScrapedPage> {
        let resp = self
            .http
            .post(format!("{}/scrape", self.base_url))
            .bearer_auth(api_key)
            .json(&json!({ "url": url, "formats": ["markdown"] }))
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::new(ProviderErrorKind::RateLimited, "firecrawl rate limited")
                .with_status(429));
        }
        if !status.is_success() {
            return Err(
                ProviderError::upstream_failure(format!("firecrawl returned {status}"))
                    .with_status(status.as_u16()),
            );
        }

        let value: serde_json::Value = resp.json().await.map_err(ProviderError::from)?;
        let data = &value["data"];

        Ok(ScrapedPage {
            url: url.to_string(),
            markdown: data["markdown"].as_str().unwrap_or_default().to_string(),
            html: data["html"].as_str().unwrap_or_default().to_string(),
            title: data["metadata"]["title"].as_str().map(str::to_string),
            description: data["metadata"]["description"].as_str().map(str::to_string),
            links: data["links"]
                .as_array()
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
            screenshot: data["screenshot"].as_str().map(str::to_string),
        })
    }

    async fn scrape_natively(&self, url: &str) -> ProviderResult<ScrapedPage> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(
                ProviderError::upstream_failure(format!("fetch returned {status}"))
                    .with_status(status.as_u16()),
            );
        }
        let html = resp.text().await.map_err(ProviderError::from)?;

        Ok(ScrapedPage {
            url: url.to_string(),
            markdown: html_to_markdown(&html),
            links: extract_links(&html),
            title: extract_title(&html),
            description: extract_meta_description(&html),
            html,
            screenshot: None,
        })
    }
}

#[async_trait]
impl Scraper for FirecrawlScraper {
    async fn scrape(&self, url: &str) -> ProviderResult<ScrapedPage> {
        match &self.api_key {
            Some(key) => self.scrape_via_firecrawl(url, key).await,
            None => self.scrape_natively(url).await,
        }
    }

    async fn crawl(&self, url: &str, limit: u32) -> ProviderResult<Vec<ScrapedPage>> {
        if let Some(key) = &self.api_key {
            let resp = self
                .http
                .post(format!("{}/crawl", self.base_url))
                .bearer_auth(key)
                .json(&json!({ "url": url, "limit": limit }))
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(
                    ProviderError::upstream_failure(format!("firecrawl crawl returned {status}"))
                        .with_status(status.as_u16()),
                );
            }
            let value: serde_json::Value = resp.json().await.map_err(ProviderError::from)?;
            let pages = value["data"]
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .map(|page| ScrapedPage {
                            url: page["url"].as_str().unwrap_or_default().to_string(),
                            markdown: page["markdown"].as_str().unwrap_or_default().to_string(),
                            html: page["html"].as_str().unwrap_or_default().to_string(),
                            title: page["metadata"]["title"].as_str().map(str::to_string),
                            description: page["metadata"]["description"].as_str().map(str::to_string),
                            links: page["links"]
                                .as_array()
                                .map(|l| l.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                                .unwrap_or_default(),
                            screenshot: page["screenshot"].as_str().map(str::to_string),
                        })
                        .collect()
                })
                .unwrap_or_default();
            return Ok(pages);
        }

        Ok(vec![self.scrape_natively(url).await?])
    }
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static SCRIPT_STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\n[ \t]*\n+").unwrap());
static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static META_DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\s+name=["']description["']\s+content=["'](.*?)["']"#).unwrap()
});
static HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?is)<a\s+[^>]*href=["']([^"']+)["']"#).unwrap());

fn extract_links(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .filter(|href| !href.starts_with('#') && !href.starts_with("javascript:"))
        .collect()
}

fn html_to_markdown(html: &str) -> String {
    let without_scripts = SCRIPT_STYLE_RE.replace_all(html, "");
    let stripped = TAG_RE.replace_all(&without_scripts, "\n");
    let collapsed = WHITESPACE_RE.replace_all(&stripped, "\n\n");
    collapsed.trim().to_string()
}

fn extract_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_meta_description(html: &str) -> Option<String> {
    META_DESCRIPTION_RE
        .captures(html)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        let html = "<html><body><h1>Title</h1>\n\n\n<p>Body text</p></body></html>";
        let markdown = html_to_markdown(html);
        assert!(markdown.contains("Title"));
        assert!(markdown.contains("Body text"));
        assert!(!markdown.contains('<'));
    }

    #[test]
    fn removes_script_and_style_blocks() {
        let html = "<html><head><style>.a{color:red}</style></head><body><script>alert(1)</script><p>Text</p></body></html>";
        let markdown = html_to_markdown(html);
        assert!(!markdown.contains("alert"));
        assert!(!markdown.contains("color:red"));
        assert!(markdown.contains("Text"));
    }

    #[test]
    fn extracts_title_and_description() {
        let html = r#"<html><head><title>Alpha Co</title><meta name="description" content="We build widgets"></head></html>"#;
        assert_eq!(extract_title(html), Some("Alpha Co".to_string()));
        assert_eq!(extract_meta_description(html), Some("We build widgets".to_string()));
    }
}
