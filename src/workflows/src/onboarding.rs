//! Onboarding Workflow (C4, §4.4): the COPY (scrape an existing site) and
//! VOICE (structured interview) variants that both terminate in a matched
//! template plus a built `DeploymentContext` + `ContentContext`.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use wts_progress::{ProgressEvent, ProgressSink, StepId};
use wts_providers::{AiVendor, ChatMessage, ChatRequest, ChatRole, Scraper};

use crate::brief::Brief;
use crate::catalog::{CatalogCache, TemplateCatalogEntry, FALLBACK_SLUG};
use crate::context::{
    Branding, Business, ContactInfo, ContentContext, ContextOrigin, DemoContent, DeploymentContext,
    Language, Seo, Template, Tone,
};

/// Provider clients the onboarding workflow is run against. The scraper is
/// never absent — [`wts_providers::scraper::FirecrawlScraper`] degrades to a
/// native fetch when no vendor key is configured, so onboarding itself never
/// has to special-case a missing scraper.
pub struct OnboardingContext {
    pub scraper: Arc<dyn Scraper>,
    pub ai: Option<Arc<dyn AiVendor>>,
    pub catalog: Arc<CatalogCache>,
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct OnboardingCopyParams {
    pub correlation_id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct OnboardingVoiceParams {
    pub correlation_id: String,
    pub answers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateMatch {
    pub slug: String,
    pub skin: Option<String>,
    pub variation: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OnboardingResult {
    pub success: bool,
    pub deployment_context: Option<DeploymentContext>,
    pub content_context: Option<ContentContext>,
    pub template_match: Option<TemplateMatch>,
    pub error: Option<String>,
}

impl OnboardingResult {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            deployment_context: None,
            content_context: None,
            template_match: None,
            error: Some(error.into()),
        }
    }
}

pub struct OnboardingWorkflow;

impl OnboardingWorkflow {
    /// COPY variant (§4.4): scrape the URL, extract brand elements, analyze
    /// with the text model (the provider contract exposes chat only, so
    /// "vision-capable model" analysis is done over the scraped markdown —
    /// see DESIGN.md), match a template, build contexts.
    pub async fn run_copy(
        ctx: &OnboardingContext,
        params: OnboardingCopyParams,
        sink: Arc<dyn ProgressSink>,
    ) -> OnboardingResult {
        sink.emit(ProgressEvent::new(StepId::ScrapingSite, "scraping site"));
        let scraped = match ctx.scraper.scrape(&params.url).await {
            Ok(page) => page,
            Err(err) => return OnboardingResult::failed(err.vendor_message),
        };

        if ctx.cancellation.is_cancelled() {
            return OnboardingResult::failed("cancelled");
        }

        sink.emit(ProgressEvent::new(StepId::ExtractingBrand, "extracting brand elements"));
        let brand = BrandElements::extract(&scraped.html, &scraped.links);

        let analysis = match &ctx.ai {
            Some(vendor) => analyze_site(vendor.as_ref(), &scraped).await,
            None => None,
        };

        let business_name = analysis
            .as_ref()
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| derive_name_from_title(scraped.title.as_deref(), &params.url));
        let tagline = analysis.as_ref().and_then(|a| a.tagline.clone());
        let industry = analysis.as_ref().and_then(|a| a.industry.clone());

        sink.emit(ProgressEvent::new(StepId::MatchingTemplate, "matching template"));
        let entries = ctx.catalog.entries().await;
        let descriptor = format!(
            "{}\n{}",
            scraped.title.clone().unwrap_or_default(),
            scraped.description.clone().unwrap_or_default()
        );
        let template_match = match &ctx.ai {
            Some(vendor) => match_template_ai(vendor.as_ref(), &entries, &descriptor, industry.as_deref()).await,
            None => None,
        }
        .unwrap_or_else(|| match_template_keyword(&entries, industry.as_deref()));

        sink.emit(ProgressEvent::new(StepId::BuildingContext, "building contexts"));

        let deployment = DeploymentContext {
            template: Template {
                slug: template_match.slug.clone(),
                skin: template_match.skin.clone(),
                variation: template_match.variation.clone(),
            },
            plugins: vec![],
            demo_content: DemoContent::default(),
            branding: Branding {
                primary_color: brand.primary_color.clone(),
                secondary_color: brand.secondary_color.clone(),
                logo_url: brand.logo_url.clone(),
                favicon_url: brand.favicon_url.clone(),
            }
            .with_favicon_default(),
            features: vec![],
        };

        let content = ContentContext {
            business: Business {
                name: business_name,
                tagline,
                industry,
                services: vec![],
                target_audience: None,
                unique_selling_points: vec![],
                location: None,
                contact_info: ContactInfo::default(),
            },
            language: Language::default(),
            tone: Tone::Professional,
            pages: vec![],
            seo: Seo::default(),
            origin: ContextOrigin::SourceAnalysis(
                serde_json::to_value(&analysis).unwrap_or(Value::Null),
            ),
        }
        .with_default_pages();

        finish(deployment, content, template_match)
    }

    /// VOICE variant (§4.4): answers are processed into a [`Brief`], which
    /// drives template matching and context construction the same way the
    /// COPY variant's brand/analysis does.
    pub async fn run_voice(
        ctx: &OnboardingContext,
        params: OnboardingVoiceParams,
        sink: Arc<dyn ProgressSink>,
    ) -> OnboardingResult {
        sink.emit(ProgressEvent::new(StepId::ProcessingAnswers, "processing interview answers"));
        let brief = Brief::from_answers(&params.answers);

        if ctx.cancellation.is_cancelled() {
            return OnboardingResult::failed("cancelled");
        }

        sink.emit(ProgressEvent::new(StepId::MatchingTemplate, "matching template"));
        let entries = ctx.catalog.entries().await;
        let descriptor = format!(
            "{}\nindustry: {}\nservices: {}",
            brief.business_name.clone().unwrap_or_default(),
            brief.industry.clone().unwrap_or_default(),
            brief.services.join(", ")
        );
        let template_match = match &ctx.ai {
            Some(vendor) => {
                match_template_ai(vendor.as_ref(), &entries, &descriptor, brief.industry.as_deref()).await
            }
            None => None,
        }
        .unwrap_or_else(|| match_template_keyword(&entries, brief.industry.as_deref()));

        sink.emit(ProgressEvent::new(StepId::BuildingContext, "building contexts"));

        let deployment = DeploymentContext {
            template: Template {
                slug: template_match.slug.clone(),
                skin: template_match.skin.clone(),
                variation: template_match.variation.clone(),
            },
            plugins: vec![],
            demo_content: DemoContent::default(),
            branding: Branding::default().with_favicon_default(),
            features: vec![],
        };

        let business_name = brief
            .business_name
            .clone()
            .unwrap_or_else(|| "Untitled Business".to_string());

        let content = ContentContext {
            business: Business {
                name: business_name,
                tagline: brief.tagline.clone(),
                industry: brief.industry.clone(),
                services: brief.services.clone(),
                target_audience: brief.target_audience.clone(),
                unique_selling_points: brief.unique_selling_points.clone(),
                location: brief.location.clone(),
                contact_info: brief.contact_info.clone(),
            },
            language: Language::default(),
            tone: Tone::Professional,
            pages: vec![],
            seo: Seo::default(),
            origin: ContextOrigin::VoiceInterview(serde_json::to_value(&brief).unwrap_or(Value::Null)),
        }
        .with_default_pages();

        finish(deployment, content, template_match)
    }
}

fn finish(
    deployment: DeploymentContext,
    content: ContentContext,
    template_match: TemplateMatch,
) -> OnboardingResult {
    let mut errors = Vec::new();
    if let Err(e) = deployment.validate_aggregated() {
        errors.extend(e);
    }
    if let Err(e) = content.validate_aggregated() {
        errors.extend(e);
    }

    if !errors.is_empty() {
        return OnboardingResult::failed(errors.join("; "));
    }

    OnboardingResult {
        success: true,
        deployment_context: Some(deployment),
        content_context: Some(content),
        template_match: Some(template_match),
        error: None,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SiteAnalysis {
    name: Option<String>,
    tagline: Option<String>,
    industry: Option<String>,
}

async fn analyze_site(ai: &dyn AiVendor, scraped: &wts_providers::ScrapedPage) -> Option<SiteAnalysis> {
    let prompt = format!(
        "Analyze this scraped website content and respond with JSON only: \
         {{\"name\": \"...\", \"tagline\": \"...\", \"industry\": \"...\"}}.\n\nTitle: {}\nDescription: {}\nContent:\n{}",
        scraped.title.clone().unwrap_or_default(),
        scraped.description.clone().unwrap_or_default(),
        scraped.markdown.chars().take(2000).collect::<String>(),
    );
    let request = ChatRequest {
        model: "gpt-4o-mini".to_string(),
        messages: vec![ChatMessage { role: ChatRole::User, content: prompt }],
        temperature: Some(0.2),
        max_tokens: Some(256),
    };
    match ai.chat(&request).await {
        Ok(resp) => serde_json::from_str(resp.content.trim()).ok(),
        Err(err) => {
            warn!(error = %err.vendor_message, "site analysis failed, continuing without it");
            None
        }
    }
}

/// Title prefix before the first of a handful of separator characters sites
/// commonly use between business name and tagline (§8 S6).
fn derive_name_from_title(title: Option<&str>, url: &str) -> String {
    if let Some(title) = title {
        let trimmed = title.trim();
        if !trimmed.is_empty() {
            let prefix = trimmed
                .split(['|', '-', '\u{2013}', ':'])
                .next()
                .unwrap_or(trimmed)
                .trim();
            if !prefix.is_empty() {
                return prefix.to_string();
            }
        }
    }
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

#[derive(Debug, Clone, Default)]
struct BrandElements {
    primary_color: Option<String>,
    secondary_color: Option<String>,
    logo_url: Option<String>,
    favicon_url: Option<String>,
}

static HEX_COLOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([0-9A-Fa-f]{6})\b").unwrap());
static IMG_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<img[^>]*>").unwrap());
static SRC_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?is)src=["']([^"']+)["']"#).unwrap());
static LINK_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<link[^>]*>").unwrap());
static HREF_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?is)href=["']([^"']+)["']"#).unwrap());

impl BrandElements {
    /// Pattern-matches the scraped HTML for logo/favicon/palette (§4.4
    /// "extract brand elements ... by pattern-matching on returned HTML;
    /// colour extraction excludes pure #FFFFFF/#000000").
    fn extract(html: &str, links: &[String]) -> Self {
        let colors = extract_colors(html);
        let mut colors_iter = colors.into_iter();

        Self {
            primary_color: colors_iter.next(),
            secondary_color: colors_iter.next(),
            logo_url: extract_logo_url(html),
            favicon_url: extract_favicon_url(html).or_else(|| {
                links
                    .iter()
                    .find(|l| l.ends_with(".ico") || l.contains("favicon"))
                    .cloned()
            }),
        }
    }
}

fn extract_colors(html: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    HEX_COLOR_RE
        .captures_iter(html)
        .filter_map(|c| c.get(0).map(|m| m.as_str().to_uppercase()))
        .filter(|hex| hex != "#FFFFFF" && hex != "#000000")
        .filter(|hex| seen.insert(hex.clone()))
        .collect()
}

fn extract_logo_url(html: &str) -> Option<String> {
    IMG_TAG_RE
        .find_iter(html)
        .map(|m| m.as_str())
        .find(|tag| tag.to_lowercase().contains("logo"))
        .and_then(|tag| SRC_ATTR_RE.captures(tag))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_favicon_url(html: &str) -> Option<String> {
    LINK_TAG_RE
        .find_iter(html)
        .map(|m| m.as_str())
        .find(|tag| {
            let lower = tag.to_lowercase();
            lower.contains("rel=\"icon\"")
                || lower.contains("rel='icon'")
                || lower.contains("shortcut icon")
        })
        .and_then(|tag| HREF_ATTR_RE.captures(tag))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Deserialize)]
struct CandidatePick {
    slug: String,
    confidence: f64,
}

#[derive(Deserialize)]
struct ModelPickResponse {
    candidates: Vec<CandidatePick>,
}

/// Asks the model to rank candidate templates, then applies the tie-break
/// rule (§4.4: "prefer the one whose `industries` list contains the brief's
/// industry token").
async fn match_template_ai(
    ai: &dyn AiVendor,
    entries: &[TemplateCatalogEntry],
    descriptor: &str,
    industry: Option<&str>,
) -> Option<TemplateMatch> {
    let catalog_list = entries
        .iter()
        .map(|e| e.slug.clone())
        .collect::<Vec<_>>()
        .join(", ");
    let prompt = format!(
        "Given this business description:\n{descriptor}\n\nRank up to 3 best-fit template slugs from: {catalog_list}. \
         Respond with JSON only: {{\"candidates\": [{{\"slug\": \"...\", \"confidence\": 0.0}}]}}"
    );
    let request = ChatRequest {
        model: "gpt-4o-mini".to_string(),
        messages: vec![ChatMessage { role: ChatRole::User, content: prompt }],
        temperature: Some(0.3),
        max_tokens: Some(256),
    };

    let response = match ai.chat(&request).await {
        Ok(resp) => resp,
        Err(err) => {
            warn!(error = %err.vendor_message, "template match model call failed, falling back to keyword match");
            return None;
        }
    };

    let parsed: ModelPickResponse = serde_json::from_str(response.content.trim()).ok()?;
    let mut candidates: Vec<(&TemplateCatalogEntry, f64)> = parsed
        .candidates
        .iter()
        .filter_map(|c| entries.iter().find(|e| e.slug == c.slug).map(|e| (e, c.confidence)))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let top_confidence = candidates[0].1;
    let tied: Vec<&(&TemplateCatalogEntry, f64)> = candidates
        .iter()
        .filter(|(_, confidence)| (*confidence - top_confidence).abs() < f64::EPSILON)
        .collect();

    let chosen = if tied.len() > 1 {
        industry
            .and_then(|token| {
                let token = token.to_lowercase();
                tied.iter()
                    .find(|(entry, _)| entry.industries.iter().any(|i| i.to_lowercase().contains(&token)))
            })
            .copied()
            .unwrap_or(tied[0])
    } else {
        &candidates[0]
    };

    Some(TemplateMatch {
        slug: chosen.0.slug.clone(),
        skin: chosen.0.skin.clone(),
        variation: chosen.0.variation.clone(),
        confidence: chosen.1,
    })
}

/// Keyword fallback (§4.4): matches industry as a case-insensitive substring
/// against the catalog, defaulting to the hardcoded fallback on miss.
fn match_template_keyword(entries: &[TemplateCatalogEntry], industry: Option<&str>) -> TemplateMatch {
    let fallback = || TemplateMatch {
        slug: FALLBACK_SLUG.to_string(),
        skin: None,
        variation: None,
        confidence: 0.0,
    };

    let Some(industry) = industry.filter(|i| !i.is_empty()) else {
        return fallback();
    };
    let industry_lower = industry.to_lowercase();

    entries
        .iter()
        .find(|e| {
            e.industries
                .iter()
                .any(|i| i.to_lowercase().contains(&industry_lower) || industry_lower.contains(&i.to_lowercase()))
        })
        .map(|e| TemplateMatch {
            slug: e.slug.clone(),
            skin: e.skin.clone(),
            variation: e.variation.clone(),
            confidence: 1.0,
        })
        .unwrap_or_else(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_logo_and_colors_excluding_pure_black_and_white() {
        let html = r#"<html><head></head><body>
            <img class="site-logo" src="https://alpha.example/logo.png">
            <style>.a{color:#336699} .b{color:#FFFFFF} .c{color:#000000}</style>
        </body></html>"#;
        let brand = BrandElements::extract(html, &[]);
        assert_eq!(brand.logo_url.as_deref(), Some("https://alpha.example/logo.png"));
        assert_eq!(brand.primary_color.as_deref(), Some("#336699"));
    }

    #[test]
    fn favicon_falls_back_to_ico_link() {
        let brand = BrandElements::extract("<html></html>", &["https://alpha.example/favicon.ico".to_string()]);
        assert_eq!(brand.favicon_url.as_deref(), Some("https://alpha.example/favicon.ico"));
    }

    #[test]
    fn derives_name_from_title_prefix() {
        assert_eq!(
            derive_name_from_title(Some("Alpha Co | Plumbing Experts"), "https://alpha.example"),
            "Alpha Co"
        );
    }

    #[test]
    fn derives_name_from_domain_when_title_missing() {
        assert_eq!(derive_name_from_title(None, "https://alpha.example/"), "alpha.example");
    }

    #[test]
    fn keyword_match_falls_back_to_flexify_on_miss() {
        let entries = vec![TemplateCatalogEntry {
            slug: "bistro".to_string(),
            industries: vec!["restaurant".to_string()],
            skin: None,
            variation: None,
        }];
        let result = match_template_keyword(&entries, Some("law firm"));
        assert_eq!(result.slug, FALLBACK_SLUG);
    }

    #[test]
    fn keyword_match_finds_industry_substring() {
        let entries = vec![TemplateCatalogEntry {
            slug: "bistro".to_string(),
            industries: vec!["restaurant".to_string(), "cafe".to_string()],
            skin: None,
            variation: None,
        }];
        let result = match_template_keyword(&entries, Some("restaurant"));
        assert_eq!(result.slug, "bistro");
    }
}
