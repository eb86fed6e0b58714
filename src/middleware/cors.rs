use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    response::Response,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

/// CORS policy: a single trusted frontend origin, credentials allowed.
///
/// Requests from any other origin get no `Access-Control-Allow-Origin`, so browsers
/// refuse the response. Preflights are answered here without reaching the router.
pub fn cors_layer(frontend_url: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(frontend_url)
        .map_err(|e| anyhow::anyhow!("FRONTEND_URL is not a valid origin: {}", e))?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::mirror_request()))
}

/// `CorsLayer` sets `Access-Control-Allow-Credentials` whatever the origin; keep it only
/// next to a granted `Access-Control-Allow-Origin`. Map responses of the CORS layer with it.
pub fn drop_unmatched_credentials(mut response: Response) -> Response {
    let headers = response.headers_mut();
    if !headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN) {
        headers.remove(header::ACCESS_CONTROL_ALLOW_CREDENTIALS);
    }
    response
}
