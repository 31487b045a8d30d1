//! Provisioning and onboarding handlers (C3/C4/C5, §6): the domain+site
//! workflow and the two onboarding variants stream progress over SSE;
//! applying a built context to a live site is a plain request/response.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{KeepAlive, Sse},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use wts_progress::{sse::TerminalOutcome, ChannelProgressSink, ProgressEventStream};
use wts_providers::host::SiteCredentials;
use wts_providers::registrar::Contact;
use wts_workflows::context::{ContentContext, DeploymentContext};
use wts_workflows::{
    applicator, ApplyResult, DomainSiteParams, DomainSiteWorkflow, OnboardingCopyParams, OnboardingWorkflow,
    OnboardingVoiceParams, WorkflowKind,
};

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DomainSiteRequest {
    pub kind: WorkflowKind,
    pub domain: String,
    #[serde(default)]
    pub register_new_domain: bool,
    #[serde(default = "default_true")]
    pub include_www: bool,
    pub site_name: Option<String>,
    pub contacts: Option<Contact>,
    #[serde(default = "default_registration_years")]
    pub registration_years: u32,
    pub deployment: Option<DeploymentContext>,
    pub content: Option<ContentContext>,
}

fn default_true() -> bool {
    true
}

fn default_registration_years() -> u32 {
    1
}

/// `POST /workflows/domain-site` — streams `ProgressEvent`s for the
/// provisioning pipeline (§4.3), then a terminal `result`/`error` frame.
pub async fn start_domain_site_workflow(
    State(state): State<AppState>,
    Json(request): Json<DomainSiteRequest>,
) -> Sse<ProgressEventStream> {
    let correlation_id = Uuid::new_v4().to_string();
    let (sink, receiver) = ChannelProgressSink::new();
    let (terminal_tx, terminal_rx) = tokio::sync::oneshot::channel();

    let ctx = state.domain_site_ctx.clone();
    let params = DomainSiteParams {
        correlation_id,
        kind: request.kind,
        domain: request.domain,
        register_new_domain: request.register_new_domain,
        include_www: request.include_www,
        site_name: request.site_name,
        contacts: request.contacts,
        registration_years: request.registration_years,
        deployment: request.deployment,
        content: request.content,
    };

    tokio::spawn(async move {
        let sink: Arc<dyn wts_progress::ProgressSink> = Arc::new(sink);
        let (run, provider_error) = DomainSiteWorkflow::run(&ctx, params, sink).await;
        let outcome = if run.success {
            TerminalOutcome::Result(serde_json::to_value(&run).unwrap_or(Value::Null))
        } else {
            let message = run
                .error
                .clone()
                .or_else(|| provider_error.map(|e| e.vendor_message))
                .unwrap_or_else(|| "workflow failed".to_string());
            TerminalOutcome::Error(message)
        };
        let _ = terminal_tx.send(outcome);
    });

    Sse::new(ProgressEventStream::new(receiver, terminal_rx)).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct OnboardingCopyRequest {
    pub url: String,
}

/// `POST /onboarding/copy` — streams progress for the COPY variant (§4.4).
pub async fn start_onboarding_copy(
    State(state): State<AppState>,
    Json(request): Json<OnboardingCopyRequest>,
) -> Sse<ProgressEventStream> {
    let correlation_id = Uuid::new_v4().to_string();
    let (sink, receiver) = ChannelProgressSink::new();
    let (terminal_tx, terminal_rx) = tokio::sync::oneshot::channel();

    let ctx = state.onboarding_ctx.clone();
    let params = OnboardingCopyParams { correlation_id, url: request.url };

    tokio::spawn(async move {
        let sink: Arc<dyn wts_progress::ProgressSink> = Arc::new(sink);
        let result = OnboardingWorkflow::run_copy(&ctx, params, sink).await;
        let outcome = onboarding_outcome(result);
        let _ = terminal_tx.send(outcome);
    });

    Sse::new(ProgressEventStream::new(receiver, terminal_rx)).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct OnboardingVoiceRequest {
    pub answers: HashMap<String, String>,
}

/// `POST /onboarding/voice` — streams progress for the VOICE variant (§4.4).
pub async fn start_onboarding_voice(
    State(state): State<AppState>,
    Json(request): Json<OnboardingVoiceRequest>,
) -> Sse<ProgressEventStream> {
    let correlation_id = Uuid::new_v4().to_string();
    let (sink, receiver) = ChannelProgressSink::new();
    let (terminal_tx, terminal_rx) = tokio::sync::oneshot::channel();

    let ctx = state.onboarding_ctx.clone();
    let params = OnboardingVoiceParams { correlation_id, answers: request.answers };

    tokio::spawn(async move {
        let sink: Arc<dyn wts_progress::ProgressSink> = Arc::new(sink);
        let result = OnboardingWorkflow::run_voice(&ctx, params, sink).await;
        let outcome = onboarding_outcome(result);
        let _ = terminal_tx.send(outcome);
    });

    Sse::new(ProgressEventStream::new(receiver, terminal_rx)).keep_alive(KeepAlive::default())
}

fn onboarding_outcome(result: wts_workflows::OnboardingResult) -> TerminalOutcome {
    if result.success {
        TerminalOutcome::Result(serde_json::to_value(&result).unwrap_or(Value::Null))
    } else {
        TerminalOutcome::Error(result.error.unwrap_or_else(|| "onboarding failed".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyContextsRequest {
    pub site_credentials: SiteCredentials,
    pub deployment: Option<DeploymentContext>,
    pub content: Option<ContentContext>,
}

#[derive(Debug, Serialize)]
pub struct ApplyContextsResponse {
    pub deployment_result: Option<ApplyResult>,
    pub page_outcomes: Vec<wts_workflows::PageOutcome>,
}

/// `POST /apply` — applies a built context pair to a live, credentialed
/// site (§4.5). Not streamed: it runs to completion and returns the
/// aggregated per-subtask outcomes.
pub async fn apply_contexts(
    State(state): State<AppState>,
    Json(request): Json<ApplyContextsRequest>,
) -> Result<Json<ApplyContextsResponse>> {
    let deployment_result = match &request.deployment {
        Some(deployment) => Some(
            applicator::apply_deployment(
                state.site_client.clone(),
                &request.site_credentials,
                deployment,
                request.content.as_ref(),
            )
            .await,
        ),
        None => None,
    };

    let page_outcomes = match &request.content {
        Some(content) => {
            let ai = state.domain_site_ctx.ai.clone();
            applicator::apply_content(state.site_client.clone(), ai, &request.site_credentials, content).await
        }
        None => Vec::new(),
    };

    Ok(Json(ApplyContextsResponse { deployment_result, page_outcomes }))
}
