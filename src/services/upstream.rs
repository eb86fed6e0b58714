//! HTTP client used by proxy route groups to reach their upstream service.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Response, Uri},
};
use std::time::Duration;
use tracing::debug;

use crate::error::ApiError;

/// Headers scoped to a single connection; never forwarded in either direction.
/// `content-length` is recomputed from the relayed body.
const HOP_BY_HOP_HEADERS: [header::HeaderName; 9] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
    header::CONTENT_LENGTH,
];

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl UpstreamClient {
    pub fn new(timeout: Duration, max_response_bytes: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            client,
            max_response_bytes,
        })
    }

    /// Send the request to `base_url` + the original path and query, relaying the answer as-is.
    pub async fn forward(
        &self,
        base_url: &str,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response<Body>, ApiError> {
        let path_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        let target_url = format!("{}{}", base_url, path_query);
        debug!(method = %method, target = %target_url, "Forwarding request upstream");

        let mut upstream = self
            .client
            .request(method, &target_url)
            .headers(strip_hop_by_hop(headers))
            .body(body)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("{} unreachable: {}", target_url, e)))?;

        let status = upstream.status();
        let response_headers = strip_hop_by_hop(upstream.headers());
        if upstream
            .content_length()
            .is_some_and(|length| length > self.max_response_bytes as u64)
        {
            return Err(self.response_too_large(&target_url));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = upstream
            .chunk()
            .await
            .map_err(|e| ApiError::Upstream(format!("{}: failed to read body: {}", target_url, e)))?
        {
            if bytes.len() + chunk.len() > self.max_response_bytes {
                return Err(self.response_too_large(&target_url));
            }
            bytes.extend_from_slice(&chunk);
        }

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }

    fn response_too_large(&self, target_url: &str) -> ApiError {
        ApiError::Upstream(format!(
            "{}: response body exceeds the {} byte limit",
            target_url, self.max_response_bytes
        ))
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP_HEADERS.iter() {
        forwarded.remove(name);
    }
    forwarded.remove("keep-alive");
    forwarded
}
