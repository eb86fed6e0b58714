// Middleware module - CORS, body decoding, metrics, error translation

pub mod body;
pub mod cors;
pub mod error_boundary;
pub mod metrics;

pub use body::{body_decoder_middleware, BodyKind, BodyLimit, ParsedBody};
pub use cors::{cors_layer, drop_unmatched_credentials};
pub use error_boundary::{error_boundary_middleware, panic_response, ErrorBoundary};
pub use metrics::{metrics_middleware, MetricsState, REQUEST_ID_HEADER};
