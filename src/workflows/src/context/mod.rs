//! Configuration and content artifacts produced by the onboarding workflow
//! and consumed by the deployment applicator (§3, §4.4, §4.5).

mod content;
mod deployment;

pub use content::{
    Business, ContactInfo, ContentContext, ContextOrigin, Language, Page, Seo, Tone,
    DEFAULT_PAGE_SLUGS,
};
pub use deployment::{Branding, DemoContent, DeploymentContext, Plugin, Template};
