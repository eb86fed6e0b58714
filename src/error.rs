use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub type Result<T> = std::result::Result<T, ApiError>;

/// `error` field of the fallback response.
pub const ROUTE_NOT_FOUND: &str = "Route not found";
/// `error` field of every handler-failure response.
pub const HANDLER_FAILURE: &str = "Something went wrong!";
/// `message` field of handler-failure responses outside development.
pub const GENERIC_FAILURE_MESSAGE: &str = "Internal server error";

/// JSON shape of every non-2xx response produced by the gateway itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
        }
    }
}

/// Marks a response as the product of a failed handler.
///
/// Attached as a response extension; the error boundary replaces the body of any
/// response carrying it and logs `detail`.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    /// Message shown to callers in development.
    pub message: String,
    /// Everything known about the failure, for the server log only.
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// Get status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upstream(_) | ApiError::Internal(_) | ApiError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client input errors are answered directly; everything else is a handler failure.
    pub fn is_failure(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// The underlying message, without the variant prefix.
    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Upstream(msg)
            | ApiError::Internal(msg) => msg.clone(),
            ApiError::Other(err) => err.to_string(),
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Other(err) => format!("{:?}", err),
            _ => self.to_string(),
        }
    }

    fn client_error_label(&self) -> &'static str {
        match self {
            ApiError::PayloadTooLarge(_) => "Payload too large",
            _ => "Invalid request body",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_failure() {
            // Safe body in case no error boundary sits above this handler.
            let envelope = ErrorEnvelope::with_message(HANDLER_FAILURE, GENERIC_FAILURE_MESSAGE);
            let mut response = (status, Json(envelope)).into_response();
            response.extensions_mut().insert(HandlerFailure {
                message: self.message(),
                detail: self.detail(),
            });
            return response;
        }

        warn!(status = %status, error = %self, "Client error occurred");
        let envelope = ErrorEnvelope::with_message(self.client_error_label(), self.message());
        (status, Json(envelope)).into_response()
    }
}
