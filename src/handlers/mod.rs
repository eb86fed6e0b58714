pub mod fallback;
pub mod health;
pub mod metrics;
pub mod proxy;

pub use fallback::route_not_found;
pub use health::{health_check, HealthResponse};
pub use metrics::get_prometheus_metrics;
pub use proxy::{proxy_routes, ProxyTarget};
