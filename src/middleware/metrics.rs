// Metrics interceptor: one latency observation per request, whichever stage answers it

use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::router::RouteGroup;
use crate::services::http_metrics::{HttpMetrics, RequestObservation, UNKNOWN_ROUTE};

/// Request ID header name
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const SLOW_REQUEST_MS: u128 = 1000;

/// State for [`metrics_middleware`].
#[derive(Clone)]
pub struct MetricsState {
    pub metrics: HttpMetrics,
    /// Groups actually mounted on the router; only these yield a prefix label.
    pub mounted: Arc<[RouteGroup]>,
}

impl MetricsState {
    pub fn new(metrics: HttpMetrics, mounted: impl IntoIterator<Item = RouteGroup>) -> Self {
        Self {
            metrics,
            mounted: mounted.into_iter().collect(),
        }
    }

    /// Pick the `route` label: matched pattern, then mount prefix, then raw path.
    pub fn route_label(&self, matched: Option<&str>, path: &str) -> String {
        if let Some(pattern) = matched {
            return pattern.to_string();
        }

        if let Some(group) = RouteGroup::for_path(path).filter(|g| self.mounted.contains(g)) {
            return group.prefix().to_string();
        }

        if !path.is_empty() {
            return path.to_string();
        }

        UNKNOWN_ROUTE.to_string()
    }
}

/// Metrics middleware that times the whole remaining pipeline.
pub async fn metrics_middleware(
    State(state): State<MetricsState>,
    request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let matched = request
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string());
    let request_id = extract_or_generate_request_id(&request);

    debug!("Request started: {} {} (ID: {})", method, path, request_id);

    let response = next.run(request).await;

    let duration = start_time.elapsed();
    let status_code = response.status().as_u16();
    let route = state.route_label(matched.as_deref(), &path);

    state.metrics.observe(&RequestObservation {
        method: method.to_string(),
        route: route.clone(),
        status_code,
        duration,
    });

    debug!(
        "Request completed: {} {} (ID: {}, Route: {}, Status: {}, Duration: {}ms)",
        method,
        path,
        request_id,
        route,
        status_code,
        duration.as_millis()
    );

    if duration.as_millis() > SLOW_REQUEST_MS {
        warn!(
            "Slow request detected: {} {} (ID: {}, Duration: {}ms)",
            method,
            path,
            request_id,
            duration.as_millis()
        );
    }

    let (mut parts, body) = response.into_parts();
    parts.headers.insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&request_id).unwrap_or_else(|_| {
            error!("Failed to add request ID header");
            HeaderValue::from_static("unknown")
        }),
    );

    Response::from_parts(parts, body)
}

/// Extract existing request ID or generate a new one
fn extract_or_generate_request_id<B>(request: &Request<B>) -> String {
    if let Some(header_value) = request.headers().get(REQUEST_ID_HEADER) {
        if let Ok(header_str) = header_value.to_str() {
            return header_str.to_string();
        }
    }

    Uuid::new_v4().to_string()
}
