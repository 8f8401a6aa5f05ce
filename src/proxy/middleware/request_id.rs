// Request correlation id middleware.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

/// Correlation id for one inbound request, carried as a typed extension
/// rather than a stringly context key.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Generate a request id, expose it to handlers via extensions, and echo it
/// back on the response as `X-Request-ID`.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = uuid::Uuid::new_v4().simple().to_string();
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}
