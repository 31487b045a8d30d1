//! wts-core API Gateway
//!
//! HTTP host wiring the provisioning orchestrator (C3/C4/C5), the AI proxy
//! (C6), and the edit executor (C7) into one service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware_layer;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, Result};
pub use state::AppState;

use axum::Router;

/// Build the main application router with all middleware and routes.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use tower::ServiceBuilder;
    use tower_http::{
        catch_panic::CatchPanicLayer, compression::CompressionLayer, cors::CorsLayer,
        request_id::SetRequestIdLayer, trace::TraceLayer,
    };

    let api_routes = routes::api::router();
    let admin_routes = routes::api::admin_router();
    let public_routes = routes::public::router();

    Router::new()
        .nest("/v1", api_routes)
        .nest("/admin", admin_routes)
        .merge(public_routes)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(middleware_layer::error_handling::handle_panic))
                .layer(SetRequestIdLayer::x_request_id(tower_http::request_id::MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(middleware_layer::logging::logging_middleware))
                .layer(middleware::from_fn(middleware_layer::logging::security_logging_middleware))
                .layer(middleware::from_fn(middleware_layer::logging::performance_monitoring_middleware))
                .layer(middleware::from_fn(middleware_layer::error_handling::database_error_middleware)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _config_type: Option<Config> = None;
        let _error_type: Option<ApiError> = None;
    }
}
