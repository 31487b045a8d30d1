//! AI Proxy handlers (C6, §4.6, §6): the OpenAI-compatible public surface
//! plus the admin CRUD behind `x-proxy-admin-secret`.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use wts_proxy::admin::{self, RegisterSiteRequest, UpdateSiteRequest};
use wts_proxy::pipeline::{self, ChatCompletionRequest};
use wts_proxy::ProxyError;

use crate::state::AppState;

/// The bearer token is the site's proxy API key, not a platform auth
/// token — it is read straight off the `Authorization` header rather than
/// going through `ApiError`'s taxonomy, since the narrow OpenAI-compatible
/// error envelope (not `ErrorResponse`) is what `/v1/*` clients expect.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Maps a [`ProxyError`] onto the OpenAI-style `{error:{message, type}}`
/// envelope (§4.6), independent of the richer `ApiError`/`ErrorResponse`
/// shape the rest of the gateway uses.
pub fn proxy_error_response(err: ProxyError) -> Response {
    let (status, error_type) = match &err {
        ProxyError::Unauthorized | ProxyError::Revoked => (StatusCode::UNAUTHORIZED, "authentication_error"),
        ProxyError::QuotaExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "quota_exceeded"),
        ProxyError::ModelNotAllowed(_) => (StatusCode::FORBIDDEN, "model_not_allowed"),
        ProxyError::UnknownModel(_) | ProxyError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
        ProxyError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error"),
        ProxyError::UpstreamError(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
        ProxyError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "proxy request failed");
    }

    let body = match &err {
        ProxyError::QuotaExceeded { used, limit } => json!({
            "error": {
                "message": err.to_string(),
                "type": error_type,
                "usage": { "used": used, "limit": limit, "remaining": (limit - used).max(0) },
            },
        }),
        _ => json!({ "error": { "message": err.to_string(), "type": error_type } }),
    };

    (status, Json(body)).into_response()
}

/// `POST /v1/chat/completions` (§4.6).
pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> Response {
    let Some(api_key) = bearer_token(&headers) else {
        return proxy_error_response(ProxyError::Unauthorized);
    };

    match pipeline::handle_chat_completion(state.proxy_store.as_ref(), &state.proxy_vendors, &api_key, request).await
    {
        Ok(response) => Json(response).into_response(),
        Err(err) => proxy_error_response(err),
    }
}

/// `GET /v1/models` (§4.6).
pub async fn list_models(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(api_key) = bearer_token(&headers) else {
        return proxy_error_response(ProxyError::Unauthorized);
    };

    match pipeline::list_models(state.proxy_store.as_ref(), &api_key).await {
        Ok(models) => Json(json!({ "object": "list", "data": models })).into_response(),
        Err(err) => proxy_error_response(err),
    }
}

/// `GET /v1/usage` (§4.6): current-month usage for the authenticated site.
pub async fn own_usage(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(api_key) = bearer_token(&headers) else {
        return proxy_error_response(ProxyError::Unauthorized);
    };

    let site = match state.proxy_store.find_by_api_key(&api_key).await {
        Ok(Some(site)) => site,
        Ok(None) => return proxy_error_response(ProxyError::Unauthorized),
        Err(err) => return proxy_error_response(ProxyError::from(err)),
    };

    match pipeline::usage_snapshot(state.proxy_store.as_ref(), site.id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => proxy_error_response(err),
    }
}

/// Validates `x-proxy-admin-secret` against the configured admin secret.
/// Returns `true` when the caller may proceed.
fn admin_authorized(state: &AppState, headers: &HeaderMap) -> bool {
    headers
        .get("x-proxy-admin-secret")
        .and_then(|v| v.to_str().ok())
        .map(|provided| provided == state.config.proxy_admin_secret)
        .unwrap_or(false)
}

fn admin_forbidden() -> Response {
    (StatusCode::FORBIDDEN, Json(json!({ "error": "forbidden", "message": "missing or invalid admin secret" })))
        .into_response()
}

/// `POST /admin/sites` (§6).
pub async fn register_site(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterSiteRequest>,
) -> Response {
    if !admin_authorized(&state, &headers) {
        return admin_forbidden();
    }
    match admin::register_site(state.proxy_store.as_ref(), request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => proxy_error_response(err),
    }
}

/// `POST /admin/sites/:id/key` (§6).
pub async fn rotate_key(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Response {
    if !admin_authorized(&state, &headers) {
        return admin_forbidden();
    }
    match admin::rotate_key(state.proxy_store.as_ref(), id).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => proxy_error_response(err),
    }
}

/// `GET /admin/sites` (§6).
pub async fn list_sites(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !admin_authorized(&state, &headers) {
        return admin_forbidden();
    }
    match admin::list_sites(state.proxy_store.as_ref()).await {
        Ok(sites) => Json(sites).into_response(),
        Err(err) => proxy_error_response(err),
    }
}

/// `GET /admin/sites/:id/usage` (§6).
pub async fn get_usage(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Response {
    if !admin_authorized(&state, &headers) {
        return admin_forbidden();
    }
    match admin::get_usage(state.proxy_store.as_ref(), id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => proxy_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /admin/sites/:id/requests` (§6).
pub async fn get_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(pagination): Query<PaginationQuery>,
) -> Response {
    if !admin_authorized(&state, &headers) {
        return admin_forbidden();
    }
    let limit = pagination.limit.unwrap_or(50).clamp(1, 200);
    let offset = pagination.offset.unwrap_or(0).max(0);
    match admin::get_requests(state.proxy_store.as_ref(), id, limit, offset).await {
        Ok(logs) => Json(logs).into_response(),
        Err(err) => proxy_error_response(err),
    }
}

/// `PATCH /admin/sites/:id` (§6).
pub async fn update_site(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSiteRequest>,
) -> Response {
    if !admin_authorized(&state, &headers) {
        return admin_forbidden();
    }
    match admin::update_site(state.proxy_store.as_ref(), id, request).await {
        Ok(site) => Json(site).into_response(),
        Err(err) => proxy_error_response(err),
    }
}

