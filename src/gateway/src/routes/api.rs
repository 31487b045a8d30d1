//! Core API routes (§6): provisioning, onboarding, deployment application,
//! the AI proxy, and the edit executor.

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::{handlers, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workflows/domain-site", post(handlers::workflows::start_domain_site_workflow))
        .route("/onboarding/copy", post(handlers::workflows::start_onboarding_copy))
        .route("/onboarding/voice", post(handlers::workflows::start_onboarding_voice))
        .route("/apply", post(handlers::workflows::apply_contexts))
        .route("/chat/completions", post(handlers::proxy::chat_completions))
        .route("/models", get(handlers::proxy::list_models))
        .route("/usage", get(handlers::proxy::own_usage))
        .route("/editor/sessions", post(handlers::editor::create_session))
        .route("/editor/sessions/:session_id/messages", post(handlers::editor::send_message))
}

/// Admin surface behind `x-proxy-admin-secret`, checked inside each handler
/// rather than by middleware so the narrow proxy error envelope stays in
/// control of the 403 body (§4.6).
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/sites", post(handlers::proxy::register_site).get(handlers::proxy::list_sites))
        .route("/sites/:id/key", post(handlers::proxy::rotate_key))
        .route("/sites/:id/usage", get(handlers::proxy::get_usage))
        .route("/sites/:id/requests", get(handlers::proxy::get_requests))
        .route("/sites/:id", patch(handlers::proxy::update_site))
}
