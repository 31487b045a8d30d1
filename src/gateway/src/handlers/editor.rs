//! Conversational Edit Executor handlers (C7, §4.7, §6).

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;
use wts_editor::{AppliedChange, EditSession};
use wts_providers::host::SiteCredentials;

use crate::error::{ApiError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: Uuid,
    pub site_id: Uuid,
    pub site_credentials: SiteCredentials,
}

/// `EditorCreateSession(userId, siteId)` (§6).
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<EditSession>> {
    let session = state
        .editor_executor()
        .create(request.user_id, request.site_id, &request.site_credentials)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
    pub site_credentials: SiteCredentials,
}

#[derive(Debug, serde::Serialize)]
pub struct SendMessageResponse {
    pub message: String,
    pub changes: Vec<AppliedChange>,
}

/// `EditorSendMessage(sessionId, userId, text)` (§6, §4.7).
pub async fn send_message(
    State(state): State<AppState>,
    axum::extract::Path(session_id): axum::extract::Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>> {
    let result = state
        .editor_executor()
        .send_message(session_id, &request.text, &request.site_credentials)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(SendMessageResponse { message: result.message, changes: result.changes }))
}
