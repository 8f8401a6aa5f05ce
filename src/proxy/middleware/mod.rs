// Middleware module - Axum middleware

pub mod cors;
pub mod request_id;

pub use cors::cors_layer;
pub use request_id::{request_id_middleware, RequestId};
