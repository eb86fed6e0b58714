//! Process-wide HTTP metrics registry.
//!
//! Built once at startup and shared by clone; every collector inside is
//! atomic, so concurrent requests record without locking.

use prometheus::{HistogramOpts, HistogramVec, Registry, TextEncoder};
use std::time::Duration;

pub const REQUEST_DURATION_METRIC: &str = "http_request_duration_seconds";

/// Upper bounds in seconds; `+Inf` is implicit.
pub const REQUEST_DURATION_BUCKETS: [f64; 10] =
    [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0];

/// Label used when no better route label can be derived.
pub const UNKNOWN_ROUTE: &str = "unknown";

/// One finished request, ready to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestObservation {
    pub method: String,
    pub route: String,
    pub status_code: u16,
    pub duration: Duration,
}

#[derive(Clone)]
pub struct HttpMetrics {
    registry: Registry,
    request_duration: HistogramVec,
}

impl HttpMetrics {
    /// Registry holding only the request duration histogram.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                REQUEST_DURATION_METRIC,
                "Duration of HTTP requests in seconds",
            )
            .buckets(REQUEST_DURATION_BUCKETS.to_vec()),
            &["method", "route", "status_code"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            request_duration,
        })
    }

    /// Same as [`HttpMetrics::new`], plus process metrics (CPU, memory, fds) where supported.
    pub fn with_default_collectors() -> prometheus::Result<Self> {
        let metrics = Self::new()?;

        #[cfg(target_os = "linux")]
        metrics.registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(metrics)
    }

    pub fn observe(&self, observation: &RequestObservation) {
        let status_code = observation.status_code.to_string();
        self.request_duration
            .with_label_values(&[
                observation.method.as_str(),
                observation.route.as_str(),
                status_code.as_str(),
            ])
            .observe(observation.duration.as_secs_f64());
    }

    /// Current registry state in the Prometheus text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
