// HTTP server assembly: application state, routing, and the accept loop.

use std::sync::Arc;

use axum::extract::{Extension, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::models::TokenWhitelist;
use crate::proxy::handlers;
use crate::proxy::middleware::{self, RequestId};
use crate::proxy::upstream::client::BackendClient;
use crate::SERVICE_NAME;

/// Largest inbound body the proxy will buffer for forwarding.
const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Axum application state. Constructor-injected; no process-wide globals.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<BackendClient>,
    pub whitelist: Arc<TokenWhitelist>,
}

/// Socket address of the connected peer, injected per connection.
#[derive(Debug, Clone, Copy)]
pub struct PeerAddr(pub std::net::SocketAddr);

/// Running proxy server instance.
pub struct ProxyServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ProxyServer {
    /// Bind the listen port and start serving in a background task.
    pub async fn start(
        config: &Config,
        state: AppState,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), AppError> {
        let app = build_router(state);

        let addr = format!("0.0.0.0:{}", config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("Proxy server listening on http://{}", addr);

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, peer)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(
                                    app.clone().layer(Extension(PeerAddr(peer))),
                                );

                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        info!("Proxy server stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((Self { shutdown_tx: Some(shutdown_tx) }, handle))
    }

    /// Stop accepting new connections. In-flight requests run to completion.
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Build the full route/middleware stack.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .fallback(route_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(middleware::request_id_middleware))
                .layer(middleware::cors_layer()),
        )
        .with_state(state)
}

/// True when the path addresses the filtered tokens endpoint.
///
/// Exact match with one trailing slash stripped, or a raw path that carries
/// its query string inline. Sub-paths such as `/api/v2/tokens/123` are NOT
/// the tokens endpoint; they fall through to the generic proxy.
pub(crate) fn is_tokens_endpoint(path: &str) -> bool {
    let normalized = path.strip_suffix('/').unwrap_or(path);
    normalized == "/api/v2/tokens" || path.starts_with("/api/v2/tokens?")
}

/// Main routing entry point for everything except `/health`.
async fn route_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);

    info!(
        "Incoming request [{}]: {} {} (query: {:?}, remote: {:?}, user_agent: {:?})",
        request_id.0,
        parts.method,
        path,
        query.as_deref().unwrap_or(""),
        parts.extensions.get::<PeerAddr>().map(|p| p.0),
        parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    );

    if is_tokens_endpoint(&path) {
        debug!("Routing to token filter handler [{}]", request_id.0);
        return handlers::tokens::handle(state.backend.as_ref(), &state.whitelist, &request_id.0)
            .await;
    }

    debug!("Routing to standard proxy handler [{}]", request_id.0);

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("Failed to read request body [{}]: {}", request_id.0, err);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };

    let peer_ip = peer_ip_of(&parts);
    let endpoint = handlers::forward::endpoint_path(&path, query.as_deref());
    handlers::forward::handle(
        state.backend.as_ref(),
        parts.method,
        &parts.headers,
        body,
        peer_ip,
        &endpoint,
        &request_id.0,
    )
    .await
}

fn peer_ip_of(parts: &axum::http::request::Parts) -> Option<std::net::IpAddr> {
    parts
        .extensions
        .get::<PeerAddr>()
        .map(|peer| peer.0.ip())
}

/// Liveness probe; answered locally, never proxied.
async fn health_check_handler() -> Response {
    debug!("Health check request received");
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
    }))
    .into_response()
}
