pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod proxy;

/// Service identifier, reported by the health endpoint and startup logs.
pub const SERVICE_NAME: &str = "explorer-proxy";
