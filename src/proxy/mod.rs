// proxy module - reverse proxy service

pub mod handlers;
pub mod middleware;
pub mod server;
pub mod upstream;

pub use server::{AppState, ProxyServer};
pub use upstream::{BackendClient, BackendError};
