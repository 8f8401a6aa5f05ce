// CORS layer. Owns every Access-Control-* header on responses; backend
// copies of these headers are stripped by the forward handler.

use std::time::Duration;

use axum::http::{header, HeaderName, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

/// Build the CORS layer wrapping every route.
///
/// Mirrors the request origin (required for credentialed requests), answers
/// OPTIONS preflight directly so the proxy handlers never see it, and caches
/// preflight results for a day.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::HEAD,
            Method::PATCH,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_TYPE,
            header::DATE,
            header::SERVER,
            HeaderName::from_static("x-request-id"),
            header::CACHE_CONTROL,
            header::ETAG,
            header::LAST_MODIFIED,
        ])
        .max_age(Duration::from_secs(86400))
}
