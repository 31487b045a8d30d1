//! Health check handlers (§6 observability).

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{error::Result, state::AppState};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub mode: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Get system health status, including whether the database is reachable.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthStatus>> {
    let healthy = state.is_healthy().await;
    Ok(Json(HealthStatus {
        status: if healthy { "healthy" } else { "degraded" },
        mode: if healthy { "full" } else { "degraded" },
        timestamp: chrono::Utc::now(),
    }))
}

/// Simple liveness probe, independent of downstream dependencies.
pub async fn liveness() -> Result<Json<serde_json::Value>> {
    Ok(Json(serde_json::json!({
        "status": "alive",
        "timestamp": chrono::Utc::now()
    })))
}

/// Readiness probe: reports whether the gateway is ready to serve traffic
/// that depends on the database (proxy admin, editor sessions).
pub async fn readiness(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let is_ready = state.is_healthy().await;

    Ok(Json(serde_json::json!({
        "status": if is_ready { "ready" } else { "not_ready" },
        "timestamp": chrono::Utc::now()
    })))
}
