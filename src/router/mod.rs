//! Router configuration module.
//!
//! [`Gateway`] assembles the request pipeline: route groups and built-in endpoints
//! behind a fixed stack of middleware, with a not-found fallback at the end.

mod groups;

pub use groups::RouteGroup;

use anyhow::Result;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::collections::BTreeMap;
use tower::{Layer, ServiceBuilder};
use tower_http::{
    catch_panic::CatchPanicLayer, normalize_path::NormalizePathLayer, trace::TraceLayer,
};
use tracing::info;

use crate::app_state::AppState;
use crate::handlers::{self, ProxyTarget};
use crate::middleware::{
    body_decoder_middleware, cors_layer, drop_unmatched_credentials, error_boundary_middleware,
    metrics_middleware, panic_response, BodyLimit, ErrorBoundary, MetricsState,
};
use crate::services::UpstreamClient;

/// Builder for the gateway router.
pub struct Gateway {
    state: AppState,
    groups: BTreeMap<RouteGroup, Router<AppState>>,
}

impl Gateway {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            groups: BTreeMap::new(),
        }
    }

    /// Mount the handler set for `group` under its prefix, replacing any earlier one.
    pub fn mount(mut self, group: RouteGroup, routes: Router<AppState>) -> Self {
        self.groups.insert(group, routes);
        self
    }

    /// Mount a proxy for every group that has an upstream URL configured.
    pub fn mount_upstreams(mut self, client: &UpstreamClient) -> Self {
        let config = self.state.config.clone();
        for (group, base_url) in &config.upstreams {
            info!("Proxying {} to {}", group, base_url);
            self = self.mount(
                *group,
                handlers::proxy_routes(ProxyTarget {
                    group: *group,
                    base_url: base_url.clone(),
                    body_limit: config.body_limit_bytes,
                    client: client.clone(),
                }),
            );
        }
        self
    }

    pub fn mounted_groups(&self) -> Vec<RouteGroup> {
        self.groups.keys().copied().collect()
    }

    /// Compose the pipeline.
    ///
    /// Outermost first: metrics, tracing, CORS, body decoding, error boundary, panic
    /// capture; then routing, with the fallback last. Metrics sits outside CORS and the
    /// body decoders so that preflights and rejected bodies are observed too.
    ///
    /// Routing ignores a trailing slash, so `/api/users/` reaches the group's `/` route.
    /// [`OriginalUri`](axum::extract::OriginalUri) still holds the path as sent.
    pub fn build(self) -> Result<Router> {
        let config = self.state.config.clone();
        let metrics_state = MetricsState::new(self.state.metrics.clone(), self.mounted_groups());

        let mut router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::get_prometheus_metrics));

        for (group, routes) in self.groups {
            router = router.nest(group.prefix(), routes);
        }

        let router = router
            .method_not_allowed_fallback(handlers::route_not_found)
            .fallback(handlers::route_not_found)
            .layer(
                ServiceBuilder::new()
                    .layer(from_fn_with_state(metrics_state, metrics_middleware))
                    .layer(TraceLayer::new_for_http())
                    .map_response(drop_unmatched_credentials)
                    .layer(cors_layer(&config.frontend_url)?)
                    .layer(from_fn_with_state(
                        BodyLimit(config.body_limit_bytes),
                        body_decoder_middleware,
                    ))
                    .layer(from_fn_with_state(
                        ErrorBoundary::new(config.is_development()),
                        error_boundary_middleware,
                    ))
                    .layer(CatchPanicLayer::custom(panic_response)),
            )
            .with_state(self.state);

        // The outer router records OriginalUri before the path is trimmed.
        let router = Router::new()
            .fallback_service(NormalizePathLayer::trim_trailing_slash().layer(router));

        Ok(router)
    }
}

/// Build the application router from configuration alone.
///
/// Groups with an upstream URL are proxied; the rest stay unmounted and answer 404.
pub fn build_router(state: AppState) -> Result<Router> {
    let client = UpstreamClient::new(
        std::time::Duration::from_secs(state.config.upstream_timeout_secs),
        state.config.upstream_response_limit_bytes,
    )?;

    Gateway::new(state).mount_upstreams(&client).build()
}
