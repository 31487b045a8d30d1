//! `ContentContext` (§3, §4.4 construction rules).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::deployment::flatten_validation_errors;

pub const DEFAULT_PAGE_SLUGS: &[&str] = &["home", "about", "services", "contact", "blog"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    #[validate(length(min = 1, message = "business.name must not be empty"))]
    pub name: String,
    pub tagline: Option<String>,
    pub industry: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    pub target_audience: Option<String>,
    #[serde(default)]
    pub unique_selling_points: Vec<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub contact_info: ContactInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    pub primary: String,
    #[serde(default)]
    pub additional: Vec<String>,
}

impl Default for Language {
    fn default() -> Self {
        Self { primary: "en".to_string(), additional: vec![] }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Friendly,
    Casual,
    Formal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[validate(length(min = 1, message = "page.slug must not be empty"))]
    pub slug: String,
    #[validate(length(min = 1, message = "page.title must not be empty"))]
    pub title: String,
    #[serde(default)]
    pub sections: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Seo {
    #[validate(length(max = 60, message = "metaTitle must be at most 60 characters"))]
    pub meta_title: String,
    #[validate(length(max = 160, message = "metaDescription must be at most 160 characters"))]
    pub meta_description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Exactly one of these is populated, per the variant the context was built
/// from (§3: "plus one of `sourceAnalysis` / `voiceInterview` depending on
/// origin variant").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ContextOrigin {
    SourceAnalysis(Value),
    VoiceInterview(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentContext {
    pub business: Business,
    #[serde(default)]
    pub language: Language,
    pub tone: Tone,
    pub pages: Vec<Page>,
    pub seo: Seo,
    pub origin: ContextOrigin,
}

impl ContentContext {
    /// Defaults pages to `[home, about, services, contact, blog]` when the
    /// brief/scrape supplied none (§4.4).
    pub fn with_default_pages(mut self) -> Self {
        if self.pages.is_empty() {
            self.pages = DEFAULT_PAGE_SLUGS
                .iter()
                .map(|slug| Page {
                    slug: slug.to_string(),
                    title: titlecase(slug),
                    sections: vec![],
                })
                .collect();
        }
        self
    }

    pub fn validate_aggregated(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(business_errors) = self.business.validate() {
            errors.extend(flatten_validation_errors(&business_errors));
        }
        if let Err(seo_errors) = self.seo.validate() {
            errors.extend(flatten_validation_errors(&seo_errors));
        }
        for (index, page) in self.pages.iter().enumerate() {
            if let Err(page_errors) = page.validate() {
                errors.extend(
                    flatten_validation_errors(&page_errors)
                        .into_iter()
                        .map(|e| format!("pages[{index}].{e}")),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn titlecase(slug: &str) -> String {
    let mut chars = slug.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_content_context() -> ContentContext {
        ContentContext {
            business: Business {
                name: "Alpha Co".to_string(),
                tagline: None,
                industry: None,
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
            origin: ContextOrigin::VoiceInterview(Value::Null),
        }
    }

    #[test]
    fn missing_business_name_fails() {
        let mut ctx = valid_content_context();
        ctx.business.name = String::new();
        assert!(ctx.validate_aggregated().is_err());
    }

    #[test]
    fn empty_pages_default_to_standard_set() {
        let ctx = valid_content_context().with_default_pages();
        let slugs: Vec<&str> = ctx.pages.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, DEFAULT_PAGE_SLUGS);
    }

    #[test]
    fn overlong_meta_description_fails() {
        let mut ctx = valid_content_context();
        ctx.seo.meta_description = "x".repeat(161);
        assert!(ctx.validate_aggregated().is_err());
    }
}
