//! Deployment Applicator (C5, §4.5): applies a `DeploymentContext` and
//! `ContentContext` to a live, credentialed site. Every subtask accumulates
//! its own [`StepOutcome`] rather than raising for control flow (§9 "Remove
//! exceptions used for control flow in the applicator").

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;
use wts_providers::host::SiteCredentials;
use wts_providers::site::{PageInput, SiteClient, SiteSettings};
use wts_providers::{AiVendor, ChatMessage, ChatRequest, ChatRole};

use crate::context::{Business, ContentContext, DeploymentContext, Page};

/// A subtask's result: either it succeeded with some descriptive payload, or
/// it soft-failed — logged, but never aborting the batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Ok(Value),
    SoftFailed(String),
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, StepOutcome::Ok(_))
    }

    fn from_result<T: Serialize>(result: Result<T, wts_providers::ProviderError>) -> Self {
        match result {
            Ok(value) => StepOutcome::Ok(serde_json::to_value(value).unwrap_or(Value::Null)),
            Err(err) => StepOutcome::SoftFailed(err.vendor_message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub settings_outcome: StepOutcome,
    pub logo_outcome: StepOutcome,
    pub favicon_outcome: StepOutcome,
    pub custom_css_outcome: StepOutcome,
    pub plugin_outcomes: Vec<(String, StepOutcome)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageOutcome {
    pub slug: String,
    pub outcome: StepOutcome,
    pub page_id: Option<u64>,
}

/// Applies branding, customizer assets, and plugins (§4.5 steps 1–3). Page
/// content generation is handled separately by [`apply_content`] since it
/// depends on the AI vendor and runs as its own progress step.
pub async fn apply_deployment(
    site: Arc<dyn SiteClient>,
    creds: &SiteCredentials,
    deployment: &DeploymentContext,
    content: Option<&ContentContext>,
) -> ApplyResult {
    let title = content.map(|c| c.business.name.clone());
    let tagline = content.and_then(|c| c.business.tagline.clone());

    let settings_outcome = if title.is_some() || tagline.is_some() {
        StepOutcome::from_result(
            site.update_settings(creds, &SiteSettings { title, tagline })
                .await,
        )
    } else {
        StepOutcome::Ok(json!({ "skipped": true }))
    };

    let logo_outcome = match &deployment.branding.logo_url {
        Some(url) if !url.is_empty() => apply_logo(&site, creds, url).await,
        _ => StepOutcome::Ok(json!({ "skipped": true })),
    };

    let favicon_outcome = match &deployment.branding.favicon_url {
        Some(url) if !url.is_empty() => apply_favicon(&site, creds, url).await,
        _ => StepOutcome::Ok(json!({ "skipped": true })),
    };

    let custom_css_outcome = match &deployment.branding.primary_color {
        Some(color) => {
            let css = format!(":root {{ --primary-color: {color}; }}");
            StepOutcome::from_result(site.set_custom_css(creds, &css).await)
        }
        None => StepOutcome::Ok(json!({ "skipped": true })),
    };

    let mut plugin_outcomes = Vec::with_capacity(deployment.plugins.len());
    for plugin in &deployment.plugins {
        let outcome = if plugin.activate {
            StepOutcome::from_result(site.install_plugin(creds, &plugin.slug).await)
        } else {
            StepOutcome::Ok(json!({ "installed": false }))
        };
        if let StepOutcome::SoftFailed(ref message) = outcome {
            warn!(plugin = %plugin.slug, error = %message, "plugin install/activate failed, continuing");
        }
        plugin_outcomes.push((plugin.slug.clone(), outcome));
    }

    ApplyResult {
        settings_outcome,
        logo_outcome,
        favicon_outcome,
        custom_css_outcome,
        plugin_outcomes,
    }
}

async fn apply_logo(site: &Arc<dyn SiteClient>, creds: &SiteCredentials, url: &str) -> StepOutcome {
    match site.upload_media(creds, url).await {
        Ok(media) => StepOutcome::from_result(site.set_site_logo(creds, media.id).await),
        Err(err) => {
            warn!(error = %err.vendor_message, "logo upload failed, continuing");
            StepOutcome::SoftFailed(err.vendor_message)
        }
    }
}

async fn apply_favicon(site: &Arc<dyn SiteClient>, creds: &SiteCredentials, url: &str) -> StepOutcome {
    match site.upload_media(creds, url).await {
        Ok(media) => StepOutcome::from_result(site.set_site_icon(creds, media.id).await),
        Err(err) => {
            warn!(error = %err.vendor_message, "favicon upload failed, continuing");
            StepOutcome::SoftFailed(err.vendor_message)
        }
    }
}

/// Known section taxonomy (§4.5 step 4) mapped to a small fixed HTML block
/// used both as the AI prompt's expected shape and as the fallback template.
const SECTION_TAXONOMY: &[&str] = &["hero", "features", "about", "services", "contact"];

/// Generates and publishes each page in `content.pages` (§4.5 step 4): AI
/// content on success, a fixed per-slug template on AI failure. Remembers
/// the `home` slug's created id and marks it as the front page.
pub async fn apply_content(
    site: Arc<dyn SiteClient>,
    ai: Option<Arc<dyn AiVendor>>,
    creds: &SiteCredentials,
    content: &ContentContext,
) -> Vec<PageOutcome> {
    let mut outcomes = Vec::with_capacity(content.pages.len());
    let mut home_page_id = None;

    for page in &content.pages {
        let html = match &ai {
            Some(vendor) => match generate_page_html(vendor.as_ref(), &content.business, page).await {
                Ok(html) => html,
                Err(err) => {
                    warn!(slug = %page.slug, error = %err.vendor_message, "AI content generation failed, using fallback template");
                    fallback_template(page)
                }
            },
            None => fallback_template(page),
        };

        let input = PageInput {
            title: page.title.clone(),
            content: html,
            slug: Some(page.slug.clone()),
            status: Some("publish".to_string()),
        };

        match site.create_page(creds, &input).await {
            Ok(record) => {
                if page.slug == "home" {
                    home_page_id = Some(record.id);
                }
                outcomes.push(PageOutcome {
                    slug: page.slug.clone(),
                    outcome: StepOutcome::Ok(json!({ "id": record.id })),
                    page_id: Some(record.id),
                });
            }
            Err(err) => {
                warn!(slug = %page.slug, error = %err.vendor_message, "page publish failed, continuing");
                outcomes.push(PageOutcome {
                    slug: page.slug.clone(),
                    outcome: StepOutcome::SoftFailed(err.vendor_message),
                    page_id: None,
                });
            }
        }
    }

    if let Some(id) = home_page_id {
        if let Err(err) = site.set_front_page(creds, id).await {
            warn!(error = %err.vendor_message, "failed to set front page, continuing");
        }
    }

    outcomes
}

async fn generate_page_html(
    ai: &dyn AiVendor,
    business: &Business,
    page: &Page,
) -> wts_providers::ProviderResult<String> {
    let prompt = format!(
        "Write website copy for the \"{}\" page of {} ({}). Respond with one HTML block per section \
         from this taxonomy: {}. Use <section data-type=\"NAME\"> wrappers.",
        page.title,
        business.name,
        business.tagline.clone().unwrap_or_default(),
        SECTION_TAXONOMY.join(", "),
    );

    let request = ChatRequest {
        model: "gpt-4o-mini".to_string(),
        messages: vec![ChatMessage { role: ChatRole::User, content: prompt }],
        temperature: Some(0.7),
        max_tokens: Some(1024),
    };

    let response = ai.chat(&request).await?;
    Ok(response.content)
}

fn fallback_template(page: &Page) -> String {
    format!(
        "<section data-type=\"hero\"><h1>{title}</h1></section>\n<section data-type=\"about\"><p>Welcome to our {slug} page.</p></section>",
        title = page.title,
        slug = page.slug,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wts_providers::error::ProviderError;
    use wts_providers::site::{MediaAsset, PageRecord, PageUpdate};

    struct StubSite {
        created: Mutex<Vec<String>>,
        fail_create_for: Option<String>,
        front_page: Mutex<Option<u64>>,
    }

    #[async_trait]
    impl SiteClient for StubSite {
        async fn update_settings(&self, _: &SiteCredentials, _: &SiteSettings) -> wts_providers::ProviderResult<()> {
            Ok(())
        }
        async fn upload_media(&self, _: &SiteCredentials, _: &str) -> wts_providers::ProviderResult<MediaAsset> {
            Ok(MediaAsset { id: 1, url: "https://example.com/logo.png".into() })
        }
        async fn set_site_logo(&self, _: &SiteCredentials, _: u64) -> wts_providers::ProviderResult<()> {
            Ok(())
        }
        async fn set_site_icon(&self, _: &SiteCredentials, _: u64) -> wts_providers::ProviderResult<()> {
            Ok(())
        }
        async fn set_custom_css(&self, _: &SiteCredentials, _: &str) -> wts_providers::ProviderResult<()> {
            Ok(())
        }
        async fn install_plugin(&self, _: &SiteCredentials, _: &str) -> wts_providers::ProviderResult<()> {
            Ok(())
        }
        async fn activate_plugin(&self, _: &SiteCredentials, _: &str) -> wts_providers::ProviderResult<()> {
            Ok(())
        }
        async fn list_pages(&self, _: &SiteCredentials) -> wts_providers::ProviderResult<Vec<PageRecord>> {
            Ok(vec![])
        }
        async fn create_page(&self, _: &SiteCredentials, page: &PageInput) -> wts_providers::ProviderResult<PageRecord> {
            if self.fail_create_for.as_deref() == page.slug.as_deref() {
                return Err(ProviderError::upstream_failure("publish failed"));
            }
            self.created.lock().unwrap().push(page.slug.clone().unwrap_or_default());
            Ok(PageRecord {
                id: self.created.lock().unwrap().len() as u64,
                title: page.title.clone(),
                content: page.content.clone(),
                slug: page.slug.clone().unwrap_or_default(),
                status: "publish".into(),
            })
        }
        async fn update_page(&self, _: &SiteCredentials, id: u64, _: &PageUpdate) -> wts_providers::ProviderResult<PageRecord> {
            Ok(PageRecord { id, title: String::new(), content: String::new(), slug: String::new(), status: "publish".into() })
        }
        async fn set_front_page(&self, _: &SiteCredentials, page_id: u64) -> wts_providers::ProviderResult<()> {
            *self.front_page.lock().unwrap() = Some(page_id);
            Ok(())
        }
    }

    fn creds() -> SiteCredentials {
        SiteCredentials {
            id: "s1".into(),
            wp_url: "https://s1.host".into(),
            wp_username: "u".into(),
            wp_password: "p".into(),
        }
    }

    #[tokio::test]
    async fn home_page_becomes_front_page() {
        let site: Arc<dyn SiteClient> = Arc::new(StubSite {
            created: Mutex::new(vec![]),
            fail_create_for: None,
            front_page: Mutex::new(None),
        });
        let content = ContentContext {
            business: Business {
                name: "Alpha".into(),
                tagline: None,
                industry: None,
                services: vec![],
                target_audience: None,
                unique_selling_points: vec![],
                location: None,
                contact_info: Default::default(),
            },
            language: Default::default(),
            tone: crate::context::Tone::Professional,
            pages: vec![Page { slug: "home".into(), title: "Home".into(), sections: vec![] }],
            seo: Default::default(),
            origin: crate::context::ContextOrigin::VoiceInterview(Value::Null),
        };

        let outcomes = apply_content(site.clone(), None, &creds(), &content).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].outcome.is_ok());
    }

    #[tokio::test]
    async fn page_failure_does_not_abort_the_batch() {
        let site: Arc<dyn SiteClient> = Arc::new(StubSite {
            created: Mutex::new(vec![]),
            fail_create_for: Some("about".into()),
            front_page: Mutex::new(None),
        });
        let content = ContentContext {
            business: Business {
                name: "Alpha".into(),
                tagline: None,
                industry: None,
                services: vec![],
                target_audience: None,
                unique_selling_points: vec![],
                location: None,
                contact_info: Default::default(),
            },
            language: Default::default(),
            tone: crate::context::Tone::Professional,
            pages: vec![
                Page { slug: "home".into(), title: "Home".into(), sections: vec![] },
                Page { slug: "about".into(), title: "About".into(), sections: vec![] },
            ],
            seo: Default::default(),
            origin: crate::context::ContextOrigin::VoiceInterview(Value::Null),
        };

        let outcomes = apply_content(site, None, &creds(), &content).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].outcome.is_ok());
        assert!(!outcomes[1].outcome.is_ok());
    }
}
