// Metrics endpoint for Prometheus
// Provides a Prometheus-compatible metrics endpoint

use crate::{error::ApiError, services::HttpMetrics};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::Response,
};

/// Prometheus metrics endpoint
///
/// Gathers the registry on every call; nothing is cached.
///
/// # Errors
///
/// Returns an error if the registry cannot be encoded
pub async fn get_prometheus_metrics(
    State(metrics): State<HttpMetrics>,
) -> Result<Response, ApiError> {
    let metrics_text = metrics
        .render()
        .map_err(|e| ApiError::Internal(format!("Failed to encode metrics: {}", e)))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, metrics.content_type())
        .body(metrics_text.into())
        .map_err(|_| ApiError::Internal("Failed to create response".to_string()))
}
