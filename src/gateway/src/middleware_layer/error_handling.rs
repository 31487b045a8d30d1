//! Error handling middleware for graceful API error responses.
//!
//! The bulk of error formatting lives in [`crate::error::ApiError`]'s
//! `IntoResponse` impl; this module covers the request-scoped parts that
//! only make sense as middleware: degraded-mode fallbacks and panic
//! responses.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

/// Converts a server error response into a degraded-mode response with
/// retry guidance, used when the gateway is running without a database.
pub async fn database_error_middleware(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;
    if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
        warn!("request failed with a server error while the database is unavailable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "service_unavailable",
                "message": "service is temporarily unavailable, please try again later",
                "retry_after_seconds": 30,
            })),
        )
            .into_response();
    }
    response
}

/// Adapter for [`tower_http::catch_panic::CatchPanicLayer::custom`]: pulls a
/// message out of the panic payload and delegates to [`handle_panic_error`].
pub fn handle_panic(payload: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    handle_panic_error(message)
}

/// Handle panics and convert them to a proper error response instead of
/// tearing down the connection.
pub fn handle_panic_error(panic_info: String) -> Response {
    let request_id = Uuid::new_v4().to_string();

    error!(request_id = %request_id, panic_info = %panic_info, "panic occurred in request handler");

    let body = json!({
        "error": "internal_error",
        "message": "an internal server error occurred",
        "request_id": request_id,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
