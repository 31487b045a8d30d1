//! WordPress site REST client (§4.5, §4.7: "the site's REST API/surface
//! using basic-auth"). Shared by the deployment applicator and the edit
//! session executor so neither embeds HTTP wiring directly.

use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::host::SiteCredentials;
use crate::http::shared_client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteSettings {
    pub title: Option<String>,
    pub tagline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: u64,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageInput {
    pub title: String,
    pub content: String,
    pub slug: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub status: String,
}

#[async_trait]
pub trait SiteClient: Send + Sync {
    async fn update_settings(&self, creds: &SiteCredentials, settings: &SiteSettings) -> ProviderResult<()>;
    async fn upload_media(&self, creds: &SiteCredentials, source_url: &str) -> ProviderResult<MediaAsset>;
    async fn set_site_logo(&self, creds: &SiteCredentials, media_id: u64) -> ProviderResult<()>;
    async fn set_site_icon(&self, creds: &SiteCredentials, media_id: u64) -> ProviderResult<()>;
    async fn set_custom_css(&self, creds: &SiteCredentials, css: &str) -> ProviderResult<()>;
    async fn install_plugin(&self, creds: &SiteCredentials, slug: &str) -> ProviderResult<()>;
    async fn activate_plugin(&self, creds: &SiteCredentials, slug: &str) -> ProviderResult<()>;
    async fn list_pages(&self, creds: &SiteCredentials) -> ProviderResult<Vec<PageRecord>>;
    async fn create_page(&self, creds: &SiteCredentials, page: &PageInput) -> ProviderResult<PageRecord>;
    async fn update_page(&self, creds: &SiteCredentials, id: u64, updates: &PageUpdate) -> ProviderResult<PageRecord>;
    async fn set_front_page(&self, creds: &SiteCredentials, page_id: u64) -> ProviderResult<()>;
}

pub struct WordPressSiteClient {
    http: reqwest::Client,
}

impl Default for WordPressSiteClient {
    fn default() -> Self {
        Self { http: shared_client() }
    }
}

impl WordPressSiteClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn base(&self, creds: &SiteCredentials) -> String {
        format!("{}/wp-json/wp/v2", creds.wp_url.trim_end_matches('/'))
    }

    fn authed(&self, creds: &SiteCredentials, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(&creds.wp_username, Some(&creds.wp_password))
    }

    async fn parse<T: serde::de::DeserializeOwned>(&self, resp: reqwest::Response) -> ProviderResult<T> {
        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::new(ProviderErrorKind::Auth, "site rejected credentials")
                .with_status(status.as_u16()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::upstream_failure(format!("site returned {status}: {body}"))
                .with_status(status.as_u16()));
        }
        resp.json().await.map_err(ProviderError::from)
    }

    fn page_from_json(value: &Value) -> PageRecord {
        PageRecord {
            id: value["id"].as_u64().unwrap_or(0),
            title: value["title"]["rendered"]
                .as_str()
                .or_else(|| value["title"].as_str())
                .unwrap_or_default()
                .to_string(),
            content: value["content"]["rendered"]
                .as_str()
                .or_else(|| value["content"].as_str())
                .unwrap_or_default()
                .to_string(),
            slug: value["slug"].as_str().unwrap_or_default().to_string(),
            status: value["status"].as_str().unwrap_or("draft").to_string(),
        }
    }
}

#[async_trait]
impl SiteClient for WordPressSiteClient {
    async fn update_settings(&self, creds: &SiteCredentials, settings: &SiteSettings) -> ProviderResult<()> {
        let resp = self
            .authed(
                creds,
                self.http.post(format!("{}/settings", self.base(creds))).json(&json!({
                    "title": settings.title,
                    "description": settings.tagline,
                })),
            )
            .send()
            .await?;
        self.parse::<Value>(resp).await?;
        Ok(())
    }

    async fn upload_media(&self, creds: &SiteCredentials, source_url: &str) -> ProviderResult<MediaAsset> {
        let downloaded = self.http.get(source_url).send().await?;
        if !downloaded.status().is_success() {
            return Err(ProviderError::upstream_failure(format!(
                "failed to download media source {source_url}"
            )));
        }
        let content_type = downloaded
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = downloaded.bytes().await.map_err(ProviderError::from)?;

        let resp = self
            .authed(
                creds,
                self.http
                    .post(format!("{}/media", self.base(creds)))
                    .header("Content-Type", content_type)
                    .header("Content-Disposition", "attachment; filename=\"asset\"")
                    .body(bytes),
            )
            .send()
            .await?;
        let value: Value = self.parse(resp).await?;

        Ok(MediaAsset {
            id: value["id"].as_u64().unwrap_or(0),
            url: value["source_url"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn set_site_logo(&self, creds: &SiteCredentials, media_id: u64) -> ProviderResult<()> {
        let resp = self
            .authed(
                creds,
                self.http
                    .post(format!("{}/settings", self.base(creds)))
                    .json(&json!({ "site_logo": media_id })),
            )
            .send()
            .await?;
        self.parse::<Value>(resp).await?;
        Ok(())
    }

    async fn set_site_icon(&self, creds: &SiteCredentials, media_id: u64) -> ProviderResult<()> {
        let resp = self
            .authed(
                creds,
                self.http
                    .post(format!("{}/settings", self.base(creds)))
                    .json(&json!({ "site_icon": media_id })),
            )
            .send()
            .await?;
        self.parse::<Value>(resp).await?;
        Ok(())
    }

    async fn set_custom_css(&self, creds: &SiteCredentials, css: &str) -> ProviderResult<()> {
        let resp = self
            .authed(
                creds,
                self.http
                    .post(format!("{}/global-styles/custom-css", self.base(creds)))
                    .json(&json!({ "css": css })),
            )
            .send()
            .await?;
        self.parse::<Value>(resp).await?;
        Ok(())
    }

    async fn install_plugin(&self, creds: &SiteCredentials, slug: &str) -> ProviderResult<()> {
        let resp = self
            .authed(
                creds,
                self.http
                    .post(format!("{}/plugins", self.base(creds)))
                    .json(&json!({ "slug": slug, "status": "active" })),
            )
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 400 {
            let body = resp.text().await.unwrap_or_default();
            if body.contains("already installed") || body.contains("exists") {
                return self.activate_plugin(creds, slug).await;
            }
            return Err(ProviderError::upstream_invalid(body));
        }
        self.parse::<Value>(resp).await?;
        Ok(())
    }

    async fn activate_plugin(&self, creds: &SiteCredentials, slug: &str) -> ProviderResult<()> {
        let resp = self
            .authed(
                creds,
                self.http
                    .put(format!("{}/plugins/{slug}", self.base(creds)))
                    .json(&json!({ "status": "active" })),
            )
            .send()
            .await?;
        self.parse::<Value>(resp).await?;
        Ok(())
    }

    async fn list_pages(&self, creds: &SiteCredentials) -> ProviderResult<Vec<PageRecord>> {
        let resp = self
            .authed(creds, self.http.get(format!("{}/pages?per_page=100", self.base(creds))))
            .send()
            .await?;
        let values: Vec<Value> = self.parse(resp).await?;
        Ok(values.iter().map(Self::page_from_json).collect())
    }

    async fn create_page(&self, creds: &SiteCredentials, page: &PageInput) -> ProviderResult<PageRecord> {
        let resp = self
            .authed(
                creds,
                self.http.post(format!("{}/pages", self.base(creds))).json(&json!({
                    "title": page.title,
                    "content": page.content,
                    "slug": page.slug,
                    "status": page.status.clone().unwrap_or_else(|| "publish".to_string()),
                })),
            )
            .send()
            .await?;
        let value: Value = self.parse(resp).await?;
        Ok(Self::page_from_json(&value))
    }

    async fn update_page(&self, creds: &SiteCredentials, id: u64, updates: &PageUpdate) -> ProviderResult<PageRecord> {
        let resp = self
            .authed(
                creds,
                self.http.post(format!("{}/pages/{id}", self.base(creds))).json(&json!({
                    "title": updates.title,
                    "content": updates.content,
                    "slug": updates.slug,
                    "status": updates.status,
                })),
            )
            .send()
            .await?;
        let value: Value = self.parse(resp).await?;
        Ok(Self::page_from_json(&value))
    }

    async fn set_front_page(&self, creds: &SiteCredentials, page_id: u64) -> ProviderResult<()> {
        let resp = self
            .authed(
                creds,
                self.http.post(format!("{}/settings", self.base(creds))).json(&json!({
                    "show_on_front": "page",
                    "page_on_front": page_id,
                })),
            )
            .send()
            .await?;
        self.parse::<Value>(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_from_json_prefers_rendered_fields() {
        let value = json!({
            "id": 10,
            "title": { "rendered": "Home" },
            "content": { "rendered": "<p>hi</p>" },
            "slug": "home",
            "status": "publish",
        });
        let page = WordPressSiteClient::page_from_json(&value);
        assert_eq!(page.id, 10);
        assert_eq!(page.title, "Home");
    }
}
