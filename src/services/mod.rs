// Shared services: metrics registry and upstream HTTP client

pub mod http_metrics;
pub mod upstream;

pub use http_metrics::{HttpMetrics, RequestObservation};
pub use upstream::UpstreamClient;
