//! Application startup: logging, state construction, server loop.

use anyhow::Result;
use axum::Router;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::{Config, LogFormat};
use crate::router;
use crate::services::HttpMetrics;

const DEFAULT_LOG_FILTER: &str = "booking_gateway=debug,tower_http=debug";

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Create the shared state: configuration plus the process-wide metrics registry.
pub fn initialize_app(config: Config) -> Result<AppState> {
    let metrics = HttpMetrics::with_default_collectors()
        .map_err(|e| anyhow::anyhow!("Failed to create metrics registry: {}", e))?;
    info!("✅ Prometheus metrics registry initialized");

    Ok(AppState::new(config, metrics))
}

/// Build the full application router for `config`.
pub fn build_app(config: Config) -> Result<Router> {
    let app_state = initialize_app(config)?;
    router::build_router(app_state)
}

/// Bind, serve until a shutdown signal arrives, then drain in-flight requests.
pub async fn run(config: Config) -> Result<()> {
    let addr = config.bind_address();
    let port = config.port;
    let environment = config.environment_name().to_string();

    let app = build_app(config)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    info!("Server running on port {}", port);
    info!("Environment: {}", environment);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully");
        },
    }
}
