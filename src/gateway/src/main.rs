//! wts-core API Gateway binary.

use std::net::SocketAddr;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wts_gateway::{build_router, config::Config, state::AppState};

#[tokio::main]
async fn main() -> wts_gateway::Result<()> {
    init_tracing();

    info!("starting wts-core API gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let state = match AppState::new(config.clone()).await {
        Ok(state) => {
            info!("application state initialized with a database connection");
            state
        }
        Err(err) => {
            warn!(error = %err, "failed to initialize full application state, starting in degraded mode");
            AppState::new_degraded(config.clone()).await?
        }
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| {
        wts_gateway::ApiError::Internal(format!("failed to bind {addr}: {err}"))
    })?;

    info!(%addr, "api gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| wts_gateway::ApiError::Internal(err.to_string()))?;

    info!("api gateway shutdown complete");
    Ok(())
}

fn init_tracing() {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wts_gateway=info,tower_http=info,axum::rejection=trace".into());

    let registry = tracing_subscriber::registry().with(filter);

    if format == "pretty" {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { warn!("received Ctrl+C, shutting down gracefully"); },
        _ = terminate => { warn!("received SIGTERM, shutting down gracefully"); },
    }
}
