// Backend client implementation
// Wraps a pooled reqwest client with forwarding and token-fetch operations.

use std::net::IpAddr;
use std::time::Instant;

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use reqwest::{header, Client, Response, StatusCode};
use thiserror::Error;
use tokio::time::Duration;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::models::TokenResponse;

/// User-Agent sent on token fetches and substituted on forwarded requests
/// that arrive without one.
pub const SERVICE_USER_AGENT: &str = "explorer-proxy/1.0";

/// Inbound headers relayed to the backend; everything else is dropped.
const FORWARDED_HEADERS: [&str; 8] = [
    "accept",
    "accept-encoding",
    "accept-language",
    "cache-control",
    "content-type",
    "user-agent",
    "x-forwarded-for",
    "x-real-ip",
];

/// Substring fallback for transport failures that surface as untyped errors.
const NETWORK_ERROR_KEYWORDS: [&str; 10] = [
    "network",
    "timeout",
    "connection",
    "refused",
    "unreachable",
    "no such host",
    "dns",
    "dial",
    "i/o timeout",
    "broken pipe",
];

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error during {operation} to {url}: {source}")]
    Network {
        operation: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API error: {status} from {url}")]
    Api {
        status_code: u16,
        status: String,
        url: String,
    },

    #[error("timeout during {operation}")]
    Timeout { operation: &'static str },

    #[error("empty response body")]
    EmptyBody,

    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read response body: {0}")]
    Read(#[source] reqwest::Error),
}

impl BackendError {
    /// True for transport-level failures reaching the backend.
    ///
    /// Besides the client's own network variants, falls back to scanning the
    /// rendered error text for well-known transport failure phrases, since
    /// not every runtime exposes those as typed errors.
    pub fn is_network(&self) -> bool {
        match self {
            BackendError::Network { .. } | BackendError::Timeout { .. } => true,
            other => matches_network_keywords(&other.to_string()),
        }
    }

    /// True only for the backend-returned-a-failure-status case.
    pub fn is_api(&self) -> bool {
        matches!(self, BackendError::Api { .. })
    }
}

pub(crate) fn matches_network_keywords(text: &str) -> bool {
    let text = text.to_lowercase();
    NETWORK_ERROR_KEYWORDS.iter().any(|kw| text.contains(kw))
}

/// HTTP client for the single configured backend.
///
/// One shared connection pool with bounded idle connections; the configured
/// timeout applies as the overall per-request deadline, not per phase.
pub struct BackendClient {
    client: Client,
    backend_url: String,
}

impl BackendClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            backend_url: config.backend_api_url(),
        })
    }

    /// Base backend API URL this client targets.
    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Forward an inbound request to `{backend}{endpoint}` as-is.
    ///
    /// Copies the curated header allow list, synthesizes `X-Forwarded-For`
    /// from the caller when absent, and defaults the User-Agent. Any response
    /// status is a success for this operation; the caller relays it verbatim.
    pub async fn forward(
        &self,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
        peer_addr: Option<IpAddr>,
        endpoint: &str,
    ) -> Result<Response, BackendError> {
        let target_url = format!("{}{}", self.backend_url, endpoint);
        debug!("Proxying {} request to backend: {}", method, target_url);

        let mut request = self.client.request(method, &target_url);

        for name in FORWARDED_HEADERS {
            if let Some(value) = headers.get(name) {
                request = request.header(name, value);
            }
        }

        if !headers.contains_key("x-forwarded-for") {
            if let Some(ip) = client_ip(headers, peer_addr) {
                request = request.header("x-forwarded-for", ip);
            }
        }

        if !headers.contains_key(header::USER_AGENT) {
            request = request.header(header::USER_AGENT, SERVICE_USER_AGENT);
        }

        if !body.is_empty() {
            request = request.body(body);
        }

        let start = Instant::now();
        let response = request.send().await.map_err(|source| {
            error!("Backend request failed for {}: {}", target_url, source);
            BackendError::Network {
                operation: "backend_request",
                url: target_url.clone(),
                source,
            }
        })?;

        info!(
            "Backend request completed: {} from {} in {:?}",
            response.status(),
            target_url,
            start.elapsed()
        );

        Ok(response)
    }

    /// Fetch the full token list from `{backend}/tokens`.
    ///
    /// Unlike `forward`, a non-200 status here is an error (the caller needs
    /// the decoded body, not a relayed response).
    pub async fn fetch_tokens(&self) -> Result<TokenResponse, BackendError> {
        let target_url = format!("{}/tokens", self.backend_url);
        debug!("Fetching tokens from backend: {}", target_url);

        let start = Instant::now();
        let response = self
            .client
            .get(&target_url)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, SERVICE_USER_AGENT)
            .send()
            .await
            .map_err(|source| {
                error!("Failed to fetch tokens from {}: {}", target_url, source);
                BackendError::Network {
                    operation: "get_tokens",
                    url: target_url.clone(),
                    source,
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            error!(
                "Backend returned non-200 status for tokens: {} from {}",
                status, target_url
            );
            return Err(BackendError::Api {
                status_code: status.as_u16(),
                status: status.to_string(),
                url: target_url,
            });
        }

        let body = response.bytes().await.map_err(BackendError::Read)?;
        let tokens = parse_tokens(&body)?;

        info!(
            "Fetched {} tokens from backend in {:?} ({} bytes)",
            tokens.items.len(),
            start.elapsed(),
            body.len()
        );

        Ok(tokens)
    }
}

fn parse_tokens(data: &[u8]) -> Result<TokenResponse, BackendError> {
    if data.is_empty() {
        return Err(BackendError::EmptyBody);
    }
    Ok(serde_json::from_slice(data)?)
}

/// Best-effort caller address: first X-Forwarded-For hop, then X-Real-IP,
/// then the socket peer address.
pub fn client_ip(headers: &HeaderMap, peer_addr: Option<IpAddr>) -> Option<String> {
    if let Some(xff) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = xff.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return Some(real_ip.to_string());
        }
    }

    peer_addr.map(|ip| ip.to_string())
}
