// Token filter handler: fetch the backend token list, intersect it with the
// whitelist, and return only matching entries.

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use tracing::{debug, error, info, warn};

use super::REQUEST_TIMEOUT;
use crate::models::{ErrorResponse, TokenResponse, TokenWhitelist};
use crate::proxy::upstream::client::{BackendClient, BackendError};

/// Capability needed by this handler: fetching the backend token list.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_tokens(&self) -> Result<TokenResponse, BackendError>;
}

#[async_trait]
impl TokenSource for BackendClient {
    async fn fetch_tokens(&self) -> Result<TokenResponse, BackendError> {
        BackendClient::fetch_tokens(self).await
    }
}

/// Serve a tokens-endpoint request.
///
/// Every error path responds with the JSON error envelope; only a failure of
/// the JSON encoder itself falls back to plain text.
pub async fn handle<C: TokenSource + ?Sized>(
    client: &C,
    whitelist: &TokenWhitelist,
    request_id: &str,
) -> Response {
    debug!("Processing token filter request [{}]", request_id);

    let result = match tokio::time::timeout(REQUEST_TIMEOUT, client.fetch_tokens()).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            operation: "get_tokens",
        }),
    };

    let tokens = match result {
        Ok(tokens) => tokens,
        Err(err) => {
            error!("Failed to fetch tokens from backend [{}]: {}", request_id, err);
            return error_response(&err);
        }
    };

    let original_count = tokens.items.len();
    let filtered = filter_tokens(tokens, whitelist).await;

    info!(
        "Filtered tokens [{}]: {} of {} returned (whitelist size {})",
        request_id,
        filtered.items.len(),
        original_count,
        whitelist.size().await
    );

    match serde_json::to_vec(&filtered) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(err) => {
            // The encoder itself failed; a structured JSON error is no longer
            // an option.
            error!("Error encoding filtered token response [{}]: {}", request_id, err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Intersect the backend response with the whitelist, preserving the
/// backend's ordering among kept entries.
///
/// An empty whitelist means no restriction is configured: the full list
/// passes through unchanged. This is deliberate, not a fail-closed filter.
async fn filter_tokens(response: TokenResponse, whitelist: &TokenWhitelist) -> TokenResponse {
    if response.items.is_empty() {
        debug!("Empty token response from backend, returning empty result");
        return TokenResponse { items: Vec::new() };
    }

    if whitelist.size().await == 0 {
        warn!(
            "Whitelist is empty, returning all {} tokens unfiltered",
            response.items.len()
        );
        return response;
    }

    let mut items = Vec::with_capacity(response.items.len());
    for token in response.items {
        if whitelist.contains(&token.address).await {
            items.push(token);
        }
    }

    debug!("Token filtering matched {} tokens", items.len());
    TokenResponse { items }
}

fn error_response(err: &BackendError) -> Response {
    let (status, message) = if err.is_network() {
        warn!("Backend API unreachable for token request");
        (StatusCode::BAD_GATEWAY, "Backend API unreachable")
    } else if err.is_api() {
        warn!("Backend API error for token request");
        (StatusCode::BAD_GATEWAY, "Backend API error")
    } else {
        error!("Internal error in token filter: {}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    (status, Json(ErrorResponse::new(message, err.to_string()))).into_response()
}
