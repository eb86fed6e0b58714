//! Application state shared across all handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::services::HttpMetrics;

/// Application state shared across handlers.
///
/// Cheap to clone: the configuration is behind an `Arc` and the metrics
/// registry is reference counted internally.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Process-wide HTTP metrics registry
    pub metrics: HttpMetrics,
}

impl AppState {
    pub fn new(config: Config, metrics: HttpMetrics) -> Self {
        Self {
            config: Arc::new(config),
            metrics,
        }
    }
}

impl axum::extract::FromRef<AppState> for HttpMetrics {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.metrics.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<Config> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}
