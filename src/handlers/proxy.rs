//! Route group backed by an upstream service.
//!
//! Every request under the group prefix is forwarded with its original path,
//! query, headers and body; the upstream answer is relayed unchanged.

use axum::{
    body::Body,
    extract::{OriginalUri, Request, State},
    response::Response,
    routing::any,
    Router,
};

use crate::error::ApiError;
use crate::middleware::body::read_body;
use crate::router::RouteGroup;
use crate::services::UpstreamClient;

#[derive(Clone)]
pub struct ProxyTarget {
    pub group: RouteGroup,
    /// Base URL without trailing slash, e.g. `http://users-svc:4000`.
    pub base_url: String,
    pub body_limit: usize,
    pub client: UpstreamClient,
}

/// Routes covering the group prefix itself and everything below it.
pub fn proxy_routes<S>(target: ProxyTarget) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", any(proxy_request))
        .route("/{*rest}", any(proxy_request))
        .with_state(target)
}

pub async fn proxy_request(
    State(target): State<ProxyTarget>,
    OriginalUri(original_uri): OriginalUri,
    request: Request<Body>,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let bytes = read_body(body, target.body_limit).await?;

    target
        .client
        .forward(
            &target.base_url,
            parts.method,
            &original_uri,
            &parts.headers,
            bytes,
        )
        .await
        .map_err(|e| {
            tracing::warn!(group = %target.group, "Upstream call failed");
            e
        })
}
