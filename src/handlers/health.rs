use axum::{extract::State, response::Json};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// ISO-8601, UTC, millisecond precision.
    pub timestamp: String,
    pub color: String,
    pub version: String,
}

impl HealthResponse {
    pub fn new(config: &Config) -> Self {
        Self {
            status: "OK".to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            color: config.color.clone(),
            version: config.version.clone(),
        }
    }
}

/// Liveness probe. Touches nothing but configuration, so it cannot fail.
pub async fn health_check(State(config): State<Arc<Config>>) -> Json<HealthResponse> {
    Json(HealthResponse::new(&config))
}
