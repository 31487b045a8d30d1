//! Domain + Site Workflow (C3, §4.3): the linear pipeline from a bare
//! domain name to a reachable, DNS-wired WordPress site.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wts_progress::{ProgressEvent, ProgressSink, StepId};
use wts_providers::{
    registrar::Contact, AiVendor, CheckResult, DnsProvider, Host, MapDomainOptions, ProviderError,
    Registrar, SiteClient,
};

use crate::applicator::{self, ApplyResult};
use crate::context::{ContentContext, DeploymentContext};
use crate::run::{StepRecord, WorkflowKind, WorkflowRun};

/// Provider clients and static configuration the workflow is run against.
/// Any client absent from config surfaces as a `validating_config` failure
/// rather than a panic deeper in the pipeline.
pub struct DomainSiteWorkflowContext {
    pub registrar: Option<Arc<dyn Registrar>>,
    pub dns: Option<Arc<dyn DnsProvider>>,
    pub host: Option<Arc<dyn Host>>,
    pub site: Arc<dyn SiteClient>,
    pub ai: Option<Arc<dyn AiVendor>>,
    pub default_contact: Option<Contact>,
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct DomainSiteParams {
    pub correlation_id: String,
    pub kind: WorkflowKind,
    pub domain: String,
    pub register_new_domain: bool,
    pub include_www: bool,
    pub site_name: Option<String>,
    pub contacts: Option<Contact>,
    pub registration_years: u32,
    pub deployment: Option<DeploymentContext>,
    pub content: Option<ContentContext>,
}

impl DomainSiteParams {
    pub fn new(correlation_id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            kind: WorkflowKind::SimpleSite,
            domain: domain.into(),
            register_new_domain: false,
            include_www: true,
            site_name: None,
            contacts: None,
            registration_years: 1,
            deployment: None,
            content: None,
        }
    }
}

pub struct DomainSiteWorkflow;

macro_rules! bail_fatal {
    ($run:expr, $step:expr, $message:expr) => {{
        $run.record(StepRecord::failed($step, $message.clone()));
        $run.fail($message);
        return ($run, None);
    }};
    ($run:expr, $step:expr, $message:expr, $provider_error:expr) => {{
        $run.record(StepRecord::failed($step, $message.clone()));
        $run.fail($message);
        return ($run, Some($provider_error));
    }};
}

impl DomainSiteWorkflow {
    pub async fn run(
        ctx: &DomainSiteWorkflowContext,
        params: DomainSiteParams,
        sink: Arc<dyn ProgressSink>,
    ) -> (WorkflowRun, Option<ProviderError>) {
        let mut run = WorkflowRun::new(params.correlation_id.clone(), params.kind);
        let emit = |sink: &Arc<dyn ProgressSink>, step: StepId, message: &str| {
            sink.emit(ProgressEvent::new(step, message));
        };

        // --- validating_config ---
        emit(&sink, StepId::ConfigValidated, "validating provider configuration");
        let dns = match &ctx.dns {
            Some(dns) => dns.clone(),
            None => bail_fatal!(run, StepId::ConfigValidated, "DNS provider is not configured".to_string()),
        };
        let host = match &ctx.host {
            Some(host) => host.clone(),
            None => bail_fatal!(run, StepId::ConfigValidated, "host provider is not configured".to_string()),
        };
        if params.register_new_domain && ctx.registrar.is_none() {
            bail_fatal!(
                run,
                StepId::ConfigValidated,
                "registrar is not configured but registerNewDomain was requested".to_string()
            );
        }
        run.record(StepRecord::ok(StepId::ConfigValidated, json!({})));

        if ctx.cancellation.is_cancelled() {
            return cancelled(run);
        }

        // --- checking_domain / registering_domain (conditional) ---
        if params.register_new_domain {
            let registrar = ctx.registrar.clone().expect("checked above");

            emit(&sink, StepId::DomainChecked, "checking domain availability");
            let check: CheckResult = match registrar.check(&params.domain).await {
                Ok(check) => check,
                Err(err) => {
                    let message = err.vendor_message.clone();
                    bail_fatal!(run, StepId::DomainChecked, message, err);
                }
            };
            run.record(StepRecord::ok(
                StepId::DomainChecked,
                json!({ "available": check.available, "premium": check.premium }),
            ));
            if !check.available {
                let message = match check.premium_price {
                    Some(price) => format!("domain unavailable (premium, price {price})"),
                    None => "domain unavailable".to_string(),
                };
                run.fail(message);
                return (run, None);
            }

            if ctx.cancellation.is_cancelled() {
                return cancelled(run);
            }

            let contacts = match params.contacts.clone().or_else(|| ctx.default_contact.clone()) {
                Some(contacts) => contacts,
                None => bail_fatal!(
                    run,
                    StepId::DomainRegistered,
                    "no registration contacts supplied and no default configured".to_string()
                ),
            };

            emit(&sink, StepId::DomainRegistered, "registering domain");
            match registrar.register(&params.domain, params.registration_years, &contacts).await {
                Ok(result) => run.record(StepRecord::ok(
                    StepId::DomainRegistered,
                    json!({ "orderId": result.order_id, "chargedAmount": result.charged_amount }),
                )),
                Err(err) => {
                    let message = err.vendor_message.clone();
                    bail_fatal!(run, StepId::DomainRegistered, message, err);
                }
            }
        }

        if ctx.cancellation.is_cancelled() {
            return cancelled(run);
        }

        // --- creating_site ---
        emit(&sink, StepId::SiteCreated, "creating site on host");
        let create_options = wts_providers::host::CreateSiteOptions::new(
            params.domain.clone(),
            params.site_name.clone(),
        );
        let credentials = match host.create_site(&create_options).await {
            Ok(credentials) => credentials,
            Err(err) => {
                let message = err.vendor_message.clone();
                bail_fatal!(run, StepId::SiteCreated, message, err);
            }
        };
        run.record(StepRecord::ok(
            StepId::SiteCreated,
            json!({ "id": credentials.id, "wpUrl": credentials.wp_url }),
        ));

        if ctx.cancellation.is_cancelled() {
            return cancelled(run);
        }

        // --- waiting_for_site ---
        emit(&sink, StepId::SiteReady, "waiting for site to become ready");
        let credentials = match host
            .wait_until_ready(&credentials.id, wts_providers::host::READY_BUDGET, wts_providers::host::READY_POLL_INTERVAL)
            .await
        {
            Ok(credentials) => credentials,
            Err(err) => {
                let message = err.vendor_message.clone();
                bail_fatal!(run, StepId::SiteReady, message, err);
            }
        };
        run.record(StepRecord::ok(StepId::SiteReady, json!({ "id": credentials.id })));

        if ctx.cancellation.is_cancelled() {
            return cancelled(run);
        }

        // --- mapping_domain ---
        emit(&sink, StepId::DomainMapped, "mapping domain to site");
        let map_result = match host
            .map_domain(
                &credentials.id,
                &params.domain,
                &MapDomainOptions { www: params.include_www, route_www: params.include_www },
            )
            .await
        {
            Ok(result) => result,
            Err(err) => {
                let message = err.vendor_message.clone();
                bail_fatal!(run, StepId::DomainMapped, message, err);
            }
        };
        run.record(StepRecord::ok(
            StepId::DomainMapped,
            json!({ "aRecords": map_result.a_records }),
        ));
        if map_result.a_records.is_empty() {
            run.fail("Failed to get A record IPs");
            return (run, None);
        }

        if ctx.cancellation.is_cancelled() {
            return cancelled(run);
        }

        // --- creating_cloudflare_zone ---
        emit(&sink, StepId::CloudflareZoneCreated, "creating DNS zone");
        let zone = match dns.get_or_create_zone(&params.domain).await {
            Ok(zone) => zone,
            Err(err) => {
                let message = err.vendor_message.clone();
                bail_fatal!(run, StepId::CloudflareZoneCreated, message, err);
            }
        };
        run.record(StepRecord::ok(
            StepId::CloudflareZoneCreated,
            json!({ "zoneId": zone.zone_id }),
        ));

        if ctx.cancellation.is_cancelled() {
            return cancelled(run);
        }

        // --- setting_dns_records ---
        emit(&sink, StepId::DnsRecordsSet, "setting A records");
        if let Err(err) = dns
            .set_a_records(&zone.zone_id, &params.domain, &map_result.a_records, params.include_www)
            .await
        {
            let message = err.vendor_message.clone();
            bail_fatal!(run, StepId::DnsRecordsSet, message, err);
        }
        run.record(StepRecord::ok(StepId::DnsRecordsSet, json!({})));

        // --- updating_nameservers / emit_nameserver_instructions ---
        let mut nameserver_instructions = None;
        if params.register_new_domain {
            emit(&sink, StepId::NameserversUpdated, "updating nameservers");
            let registrar = ctx.registrar.clone().expect("checked above");
            if let Err(err) = registrar.set_custom_nameservers(&params.domain, &zone.nameservers).await {
                let message = err.vendor_message.clone();
                bail_fatal!(run, StepId::NameserversUpdated, message, err);
            }
            run.record(StepRecord::ok(StepId::NameserversUpdated, json!({})));
        } else {
            nameserver_instructions = Some(zone.nameservers.clone());
        }

        if ctx.cancellation.is_cancelled() {
            return cancelled(run);
        }

        // --- configuring_security (best-effort) ---
        emit(&sink, StepId::SecurityConfigured, "configuring edge security");
        match dns.configure_security(&zone.zone_id).await {
            Ok(()) => run.record(StepRecord::ok(StepId::SecurityConfigured, json!({}))),
            Err(err) => {
                info!(error = %err.vendor_message, "security configuration failed, continuing");
                run.record(StepRecord::failed(StepId::SecurityConfigured, err.vendor_message));
            }
        }

        // --- checking ssl status (best-effort) ---
        let ssl_status = host.check_ssl_status(&credentials.id).await;
        match ssl_status {
            Ok(status) if status.enabled => {
                run.record(StepRecord::ok(StepId::SslActive, json!({ "status": status.status })));
            }
            Ok(status) => {
                run.record(StepRecord::ok(StepId::SslPending, json!({ "status": status.status })));
            }
            Err(err) => {
                run.record(StepRecord::failed(StepId::SslPending, err.vendor_message));
            }
        }

        // --- applying_deployment / generating_content / pushing_content (optional, soft-failure) ---
        let mut apply_result: Option<ApplyResult> = None;
        if let Some(deployment) = params.deployment.clone() {
            emit(&sink, StepId::DeploymentApplied, "applying deployment context");
            let result = applicator::apply_deployment(
                ctx.site.clone(),
                &credentials,
                &deployment,
                params.content.as_ref(),
            )
            .await;
            run.record(step_from_outcome(StepId::DeploymentApplied, &result.settings_outcome));
            apply_result = Some(result);
        }

        if let Some(content) = params.content.clone() {
            emit(&sink, StepId::ContentGenerated, "generating page content");
            emit(&sink, StepId::ContentPushed, "publishing page content");
            let pages = applicator::apply_content(ctx.site.clone(), ctx.ai.clone(), &credentials, &content).await;
            let all_ok = pages.iter().all(|p| p.outcome.is_ok());
            run.record(if all_ok {
                StepRecord::ok(StepId::ContentPushed, json!({ "pages": pages.len() }))
            } else {
                StepRecord::failed(StepId::ContentPushed, "one or more pages failed to publish")
            });
        }

        run.result = json!({
            "finalUrls": { "site": format!("https://{}", params.domain) },
            "nameserverInstructions": nameserver_instructions.map(|ns| json!({ "nameservers": ns })),
            "applyResult": apply_result,
        });

        (run, None)
    }
}

fn step_from_outcome(step: StepId, outcome: &applicator::StepOutcome) -> StepRecord {
    match outcome {
        applicator::StepOutcome::Ok(value) => StepRecord::ok(step, value.clone()),
        applicator::StepOutcome::SoftFailed(message) => StepRecord::failed(step, message.clone()),
    }
}

fn cancelled(mut run: WorkflowRun) -> (WorkflowRun, Option<ProviderError>) {
    run.record(StepRecord::failed(StepId::Cancelled, "workflow cancelled"));
    run.fail("cancelled");
    (run, None)
}

#[allow(unused)]
fn _duration_guard() -> Duration {
    Duration::from_secs(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use wts_progress::RecordingProgressSink;
    use wts_providers::error::ProviderResult;
    use wts_providers::host::{CreateSiteOptions, MapDomainResult, SiteCredentials, SslStatus};
    use wts_providers::registrar::RegisterResult;
    use wts_providers::site::{MediaAsset, PageInput, PageRecord, PageUpdate, SiteSettings};
    use wts_providers::Zone;

    struct StubRegistrar;

    #[async_trait]
    impl Registrar for StubRegistrar {
        async fn check(&self, _domain: &str) -> ProviderResult<CheckResult> {
            Ok(CheckResult { available: true, premium: false, premium_price: None })
        }
        async fn register(&self, domain: &str, _years: u32, _contacts: &Contact) -> ProviderResult<RegisterResult> {
            Ok(RegisterResult {
                domain: domain.to_string(),
                charged_amount: 10.0,
                order_id: "order-1".to_string(),
                transaction_id: "txn-1".to_string(),
            })
        }
        async fn set_custom_nameservers(&self, _domain: &str, _nameservers: &[String]) -> ProviderResult<()> {
            Ok(())
        }
    }

    struct StubDns;

    #[async_trait]
    impl DnsProvider for StubDns {
        async fn get_or_create_zone(&self, _domain: &str) -> ProviderResult<Zone> {
            Ok(Zone { zone_id: "z1".to_string(), nameservers: vec!["ns1".to_string(), "ns2".to_string()] })
        }
        async fn set_a_records(&self, _zone_id: &str, _name: &str, _ips: &[String], _include_www: bool) -> ProviderResult<()> {
            Ok(())
        }
        async fn configure_security(&self, _zone_id: &str) -> ProviderResult<()> {
            Ok(())
        }
    }

    struct StubHost {
        a_records: Vec<String>,
    }

    fn stub_credentials() -> SiteCredentials {
        SiteCredentials {
            id: "s1".to_string(),
            wp_url: "https://s1.host".to_string(),
            wp_username: "u".to_string(),
            wp_password: "p".to_string(),
        }
    }

    #[async_trait]
    impl Host for StubHost {
        async fn create_site(&self, _options: &CreateSiteOptions) -> ProviderResult<SiteCredentials> {
            Ok(stub_credentials())
        }
        async fn wait_until_ready(&self, _id: &str, _budget: Duration, _interval: Duration) -> ProviderResult<SiteCredentials> {
            Ok(stub_credentials())
        }
        async fn map_domain(&self, _site_id: &str, _domain: &str, _opts: &MapDomainOptions) -> ProviderResult<MapDomainResult> {
            Ok(MapDomainResult { a_records: self.a_records.clone() })
        }
        async fn check_ssl_status(&self, _id: &str) -> ProviderResult<SslStatus> {
            Ok(SslStatus { enabled: false, status: "pending".to_string() })
        }
    }

    struct NoopSiteClient;

    #[async_trait]
    impl SiteClient for NoopSiteClient {
        async fn update_settings(&self, _creds: &SiteCredentials, _settings: &SiteSettings) -> ProviderResult<()> {
            Ok(())
        }
        async fn upload_media(&self, _creds: &SiteCredentials, _source_url: &str) -> ProviderResult<MediaAsset> {
            Ok(MediaAsset { id: 1, url: "https://example.com/x.png".to_string() })
        }
        async fn set_site_logo(&self, _creds: &SiteCredentials, _media_id: u64) -> ProviderResult<()> {
            Ok(())
        }
        async fn set_site_icon(&self, _creds: &SiteCredentials, _media_id: u64) -> ProviderResult<()> {
            Ok(())
        }
        async fn set_custom_css(&self, _creds: &SiteCredentials, _css: &str) -> ProviderResult<()> {
            Ok(())
        }
        async fn install_plugin(&self, _creds: &SiteCredentials, _slug: &str) -> ProviderResult<()> {
            Ok(())
        }
        async fn activate_plugin(&self, _creds: &SiteCredentials, _slug: &str) -> ProviderResult<()> {
            Ok(())
        }
        async fn list_pages(&self, _creds: &SiteCredentials) -> ProviderResult<Vec<PageRecord>> {
            Ok(vec![])
        }
        async fn create_page(&self, _creds: &SiteCredentials, _page: &PageInput) -> ProviderResult<PageRecord> {
            unreachable!("not exercised by these scenarios")
        }
        async fn update_page(&self, _creds: &SiteCredentials, _id: u64, _updates: &PageUpdate) -> ProviderResult<PageRecord> {
            unreachable!("not exercised by these scenarios")
        }
        async fn set_front_page(&self, _creds: &SiteCredentials, _page_id: u64) -> ProviderResult<()> {
            Ok(())
        }
    }

    fn ctx(a_records: Vec<String>, registrar: Option<Arc<dyn Registrar>>) -> DomainSiteWorkflowContext {
        DomainSiteWorkflowContext {
            registrar,
            dns: Some(Arc::new(StubDns)),
            host: Some(Arc::new(StubHost { a_records })),
            site: Arc::new(NoopSiteClient),
            ai: None,
            default_contact: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// S1 — simple provisioning, host already has the site ready (§8).
    #[tokio::test]
    async fn s1_simple_provisioning_produces_the_canonical_eight_steps() {
        let ctx = ctx(vec!["1.2.3.4".to_string()], None);
        let params = DomainSiteParams::new("s1", "alpha.example");
        let sink: Arc<dyn ProgressSink> = Arc::new(RecordingProgressSink::new());

        let (run, provider_error) = DomainSiteWorkflow::run(&ctx, params, sink).await;

        assert!(provider_error.is_none());
        assert!(run.success);
        let steps: Vec<StepId> = run.steps.iter().map(|s| s.step).collect();
        assert_eq!(
            steps,
            vec![
                StepId::ConfigValidated,
                StepId::SiteCreated,
                StepId::SiteReady,
                StepId::DomainMapped,
                StepId::CloudflareZoneCreated,
                StepId::DnsRecordsSet,
                StepId::SecurityConfigured,
                StepId::SslPending,
            ]
        );
        assert!(run.steps.iter().all(|s| s.success));
        assert_eq!(
            run.result["nameserverInstructions"],
            json!({ "nameservers": ["ns1", "ns2"] })
        );
        assert_eq!(run.result["finalUrls"]["site"], json!("https://alpha.example"));
    }

    /// S2 — new domain registration, A records missing from host (§8).
    #[tokio::test]
    async fn s2_missing_a_records_fails_after_a_successful_domain_mapped_step() {
        let ctx = ctx(vec![], Some(Arc::new(StubRegistrar)));
        let mut params = DomainSiteParams::new("s2", "alpha.example");
        params.register_new_domain = true;
        params.contacts = Some(Contact {
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            address1: "1 Main St".to_string(),
            city: "Town".to_string(),
            state_province: "ST".to_string(),
            postal_code: "00000".to_string(),
            country: "US".to_string(),
            phone: "+1.0000000000".to_string(),
            email: "a@example.com".to_string(),
            organization: None,
        });
        let sink: Arc<dyn ProgressSink> = Arc::new(RecordingProgressSink::new());

        let (run, provider_error) = DomainSiteWorkflow::run(&ctx, params, sink).await;

        assert!(provider_error.is_none());
        assert!(!run.success);
        assert_eq!(run.error.as_deref(), Some("Failed to get A record IPs"));

        let domain_mapped = run
            .steps
            .iter()
            .find(|s| s.step == StepId::DomainMapped)
            .expect("domain_mapped step recorded");
        assert!(domain_mapped.success);
        assert_eq!(run.steps.last().unwrap().step, StepId::DomainMapped);
        assert!(run.steps.iter().all(|s| s.step as u8 <= StepId::DomainMapped as u8));
    }
}
