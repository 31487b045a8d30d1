//! Provisioning orchestration (C3), onboarding (C4), and the deployment
//! applicator (C5): everything between a bare domain name and a live,
//! content-populated WordPress site.

pub mod applicator;
pub mod brief;
pub mod catalog;
pub mod context;
pub mod domain_site;
pub mod onboarding;
pub mod run;

pub use applicator::{ApplyResult, PageOutcome, StepOutcome};
pub use brief::Brief;
pub use catalog::{CatalogCache, CatalogLoader, HttpCatalogLoader, TemplateCatalogEntry, FALLBACK_SLUG};
pub use domain_site::{DomainSiteParams, DomainSiteWorkflow, DomainSiteWorkflowContext};
pub use onboarding::{
    OnboardingContext, OnboardingCopyParams, OnboardingResult, OnboardingVoiceParams,
    OnboardingWorkflow, TemplateMatch,
};
pub use run::{StepRecord, WorkflowKind, WorkflowRun};
