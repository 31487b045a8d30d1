//! Step id enum (§4.2: "Step ids are drawn from a fixed enum; the enum is
//! versioned"). `StepRecord` (owned by `wts-workflows`) and `ProgressEvent`
//! both key off this type so a run's step sequence and its progress stream
//! agree on vocabulary.
//!
//! v1: the initial step vocabulary covering the domain+site workflow, the
//! deployment applicator, and onboarding. New steps are additive; existing
//! variants never change meaning once shipped.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum StepId {
    // Domain + site workflow (§4.3), in canonical order.
    ConfigValidated,
    DomainChecked,
    DomainRegistered,
    SiteCreated,
    SiteReady,
    DomainMapped,
    CloudflareZoneCreated,
    DnsRecordsSet,
    NameserversUpdated,
    SecurityConfigured,
    SslPending,
    SslActive,

    // Deployment applicator (§4.5), soft-failure steps.
    DeploymentApplied,
    ContentGenerated,
    ContentPushed,

    // Onboarding workflow (§4.4).
    ScrapingSite,
    ExtractingBrand,
    ProcessingAnswers,
    MatchingTemplate,
    BuildingContext,

    // Terminal markers, shared across workflow kinds.
    Complete,
    Error,
    Cancelled,
}

impl StepId {
    pub fn as_str(self) -> &'static str {
        match self {
            StepId::ConfigValidated => "config_validated",
            StepId::DomainChecked => "domain_checked",
            StepId::DomainRegistered => "domain_registered",
            StepId::SiteCreated => "site_created",
            StepId::SiteReady => "site_ready",
            StepId::DomainMapped => "domain_mapped",
            StepId::CloudflareZoneCreated => "cloudflare_zone_created",
            StepId::DnsRecordsSet => "dns_records_set",
            StepId::NameserversUpdated => "nameservers_updated",
            StepId::SecurityConfigured => "security_configured",
            StepId::SslPending => "ssl_pending",
            StepId::SslActive => "ssl_active",
            StepId::DeploymentApplied => "deployment_applied",
            StepId::ContentGenerated => "content_generated",
            StepId::ContentPushed => "content_pushed",
            StepId::ScrapingSite => "scraping_site",
            StepId::ExtractingBrand => "extracting_brand",
            StepId::ProcessingAnswers => "processing_answers",
            StepId::MatchingTemplate => "matching_template",
            StepId::BuildingContext => "building_context",
            StepId::Complete => "complete",
            StepId::Error => "error",
            StepId::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_snake_case_matching_literal_scenario_strings() {
        let json = serde_json::to_string(&StepId::CloudflareZoneCreated).unwrap();
        assert_eq!(json, "\"cloudflare_zone_created\"");
    }
}
