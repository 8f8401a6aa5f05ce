// Generic pass-through handler for every non-token endpoint.

use std::collections::HashSet;
use std::net::IpAddr;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::TryStreamExt;
use once_cell::sync::Lazy;
use tracing::{debug, error, info, warn};

use super::REQUEST_TIMEOUT;
use crate::proxy::upstream::client::{BackendClient, BackendError};

/// Connection-scoped headers that must not cross the proxy boundary.
static HOP_BY_HOP_HEADERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailers",
        "transfer-encoding",
        "upgrade",
    ])
});

/// CORS headers are owned by this service's CORS layer; backend copies are
/// dropped so the two never conflict.
static CORS_HEADERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "access-control-allow-origin",
        "access-control-allow-methods",
        "access-control-allow-headers",
        "access-control-allow-credentials",
        "access-control-expose-headers",
        "access-control-max-age",
        "access-control-request-method",
        "access-control-request-headers",
    ])
});

/// Capability needed by this handler: forwarding an arbitrary request.
#[async_trait]
pub trait RequestForwarder: Send + Sync {
    async fn forward(
        &self,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
        peer_addr: Option<IpAddr>,
        endpoint: &str,
    ) -> Result<reqwest::Response, BackendError>;
}

#[async_trait]
impl RequestForwarder for BackendClient {
    async fn forward(
        &self,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
        peer_addr: Option<IpAddr>,
        endpoint: &str,
    ) -> Result<reqwest::Response, BackendError> {
        BackendClient::forward(self, method, headers, body, peer_addr, endpoint).await
    }
}

/// Endpoint string for the backend: path plus the raw query when present.
pub fn endpoint_path(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}?{}", path, q),
        _ => path.to_string(),
    }
}

/// Serve a generic proxy request: forward it and relay the backend's
/// response. Error bodies on this path are plain text, not JSON.
pub async fn handle<C: RequestForwarder + ?Sized>(
    client: &C,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
    peer_addr: Option<IpAddr>,
    endpoint: &str,
    request_id: &str,
) -> Response {
    debug!("Processing standard proxy request [{}]: {} {}", request_id, method, endpoint);

    let method_for_log = method.clone();
    let result = match tokio::time::timeout(
        REQUEST_TIMEOUT,
        client.forward(method, headers, body, peer_addr, endpoint),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            operation: "backend_request",
        }),
    };

    let upstream = match result {
        Ok(upstream) => upstream,
        Err(err) => {
            error!("Failed to proxy request [{}] for {}: {}", request_id, endpoint, err);
            return error_response(&err);
        }
    };

    info!(
        "Successfully proxied request [{}]: {} {} -> {}",
        request_id,
        method_for_log,
        endpoint,
        upstream.status()
    );

    relay_response(upstream, endpoint)
}

/// Build the client-visible response from the backend's: status unchanged,
/// headers copied minus the strip lists, body streamed through.
fn relay_response(upstream: reqwest::Response, endpoint: &str) -> Response {
    let status = upstream.status();

    let mut builder = Response::builder().status(status);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in upstream.headers() {
            if is_stripped_header(name) {
                continue;
            }
            // append, not insert: multi-valued headers keep every value.
            headers.append(name.clone(), value.clone());
        }
    }

    let endpoint = endpoint.to_string();
    let stream = upstream.bytes_stream().inspect_err(move |err| {
        // The response is already committed at this point; nothing more can
        // be written, only logged.
        error!("Error streaming backend response body for {}: {}", endpoint, err);
    });

    builder
        .body(Body::from_stream(stream))
        .unwrap_or_else(|err| {
            error!("Failed to build relayed response: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

pub(crate) fn is_stripped_header(name: &HeaderName) -> bool {
    let name = name.as_str();
    HOP_BY_HOP_HEADERS.contains(name) || CORS_HEADERS.contains(name)
}

fn error_response(err: &BackendError) -> Response {
    if err.is_network() {
        warn!("Backend API unreachable");
        (
            StatusCode::BAD_GATEWAY,
            "Bad Gateway: Backend API unreachable",
        )
            .into_response()
    } else if err.is_api() {
        warn!("Backend API error");
        (StatusCode::BAD_GATEWAY, "Bad Gateway: Backend API error").into_response()
    } else {
        error!("Internal server error in proxy handler: {}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
