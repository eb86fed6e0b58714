use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::error::{ErrorEnvelope, ROUTE_NOT_FOUND};

/// Answers every request no route claimed.
pub async fn route_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorEnvelope::new(ROUTE_NOT_FOUND)))
}
