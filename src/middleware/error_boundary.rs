//! The single point where handler failures become the public 500 envelope.
//!
//! Failures arrive either as an [`ApiError`](crate::error::ApiError) response carrying a
//! [`HandlerFailure`] marker, or as a panic turned into such a response by
//! [`panic_response`]. Detail is logged in full; callers only see it in development.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;
use tracing::error;

use crate::error::{ErrorEnvelope, HandlerFailure, GENERIC_FAILURE_MESSAGE, HANDLER_FAILURE};

/// State for [`error_boundary_middleware`].
#[derive(Debug, Clone, Copy)]
pub struct ErrorBoundary {
    pub development: bool,
}

impl ErrorBoundary {
    pub fn new(development: bool) -> Self {
        Self { development }
    }

    pub fn envelope(&self, failure: &HandlerFailure) -> ErrorEnvelope {
        let message = if self.development {
            failure.message.clone()
        } else {
            GENERIC_FAILURE_MESSAGE.to_string()
        };
        ErrorEnvelope::with_message(HANDLER_FAILURE, message)
    }
}

pub async fn error_boundary_middleware(
    State(boundary): State<ErrorBoundary>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let Some(failure) = response.extensions().get::<HandlerFailure>().cloned() else {
        return response;
    };

    error!(
        method = %method,
        uri = %uri,
        error = %failure.detail,
        "Unhandled handler failure"
    );

    let mut response =
        (StatusCode::INTERNAL_SERVER_ERROR, Json(boundary.envelope(&failure))).into_response();
    // Keep the marker so outer layers can still tell this was a failure.
    response.extensions_mut().insert(failure);
    response
}

/// Response for a handler that panicked; used with `CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };

    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorEnvelope::with_message(
            HANDLER_FAILURE,
            GENERIC_FAILURE_MESSAGE,
        )),
    )
        .into_response();
    response.extensions_mut().insert(HandlerFailure {
        detail: format!("panic: {}", message),
        message,
    });
    response
}
