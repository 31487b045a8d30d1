//! `DeploymentContext` (§3, §4.4 construction rules).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

const COLOR_PATTERN: &str = r"^#[0-9A-Fa-f]{6}$";
const DEFAULT_FAVICON_URL: &str = "https://assets.wts.dev/default-favicon.ico";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[validate(length(min = 1, message = "template.slug must not be empty"))]
    pub slug: String,
    pub skin: Option<String>,
    pub variation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    pub slug: String,
    pub activate: bool,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoContent {
    #[serde(default)]
    pub import: bool,
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub content_slots: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    #[validate(regex(path = "COLOR_RE", message = "primaryColor must be #RRGGBB"))]
    pub primary_color: Option<String>,
    #[validate(regex(path = "COLOR_RE", message = "secondaryColor must be #RRGGBB"))]
    pub secondary_color: Option<String>,
    pub logo_url: Option<String>,
    pub favicon_url: Option<String>,
}

impl Branding {
    /// Favicon always has a value by the time a context is considered built
    /// (§4.4 "Favicon must have a value; missing → default URL").
    pub fn with_favicon_default(mut self) -> Self {
        if self.favicon_url.as_deref().map(str::is_empty).unwrap_or(true) {
            self.favicon_url = Some(DEFAULT_FAVICON_URL.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentContext {
    #[validate]
    pub template: Template,
    #[serde(default)]
    pub plugins: Vec<Plugin>,
    #[serde(default)]
    pub demo_content: DemoContent,
    #[validate]
    pub branding: Branding,
    #[serde(default)]
    pub features: Vec<String>,
}

impl DeploymentContext {
    /// Aggregated error list, per §4.4 "validation errors abort the
    /// onboarding run with the aggregated error list".
    pub fn validate_aggregated(&self) -> Result<(), Vec<String>> {
        match self.validate() {
            Ok(()) => Ok(()),
            Err(errors) => Err(flatten_validation_errors(&errors)),
        }
    }
}

static COLOR_RE: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(COLOR_PATTERN).unwrap());

pub(crate) fn flatten_validation_errors(errors: &validator::ValidationErrors) -> Vec<String> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| format!("{field}: {m}"))
                    .unwrap_or_else(|| format!("{field}: {}", e.code))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_template_slug_fails_validation() {
        let ctx = DeploymentContext {
            template: Template { slug: String::new(), skin: None, variation: None },
            plugins: vec![],
            demo_content: DemoContent::default(),
            branding: Branding::default(),
            features: vec![],
        };
        assert!(ctx.validate_aggregated().is_err());
    }

    #[test]
    fn malformed_color_fails_validation() {
        let ctx = DeploymentContext {
            template: Template { slug: "flexify".into(), skin: None, variation: None },
            plugins: vec![],
            demo_content: DemoContent::default(),
            branding: Branding {
                primary_color: Some("blue".to_string()),
                ..Branding::default()
            },
            features: vec![],
        };
        let errors = ctx.validate_aggregated().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("primaryColor") || e.contains("primary_color")));
    }

    #[test]
    fn valid_context_passes() {
        let ctx = DeploymentContext {
            template: Template { slug: "flexify".into(), skin: None, variation: None },
            plugins: vec![],
            demo_content: DemoContent::default(),
            branding: Branding {
                primary_color: Some("#336699".to_string()),
                ..Branding::default()
            }
            .with_favicon_default(),
            features: vec![],
        };
        assert!(ctx.validate_aggregated().is_ok());
        assert_eq!(ctx.branding.favicon_url.as_deref(), Some(DEFAULT_FAVICON_URL));
    }
}
