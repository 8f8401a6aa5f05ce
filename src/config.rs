// Service configuration, loaded from environment variables.

use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use crate::error::AppError;

const DEFAULT_BACKEND_HOST: &str = "https://exp.co2e.cc";
const DEFAULT_PORT: &str = "80";
const DEFAULT_WHITELIST_FILE: &str = "whitelist.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend origin, scheme included. The `/api/v2` suffix is appended by
    /// `backend_api_url`, not stored here.
    pub backend_host: String,
    pub port: u16,
    pub whitelist_file: String,
    /// Overall deadline for each outbound backend call (connect + read + write).
    pub timeout: Duration,
}

impl Config {
    /// Read configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `BACKEND_HOST`, `PORT`, `WHITELIST_FILE`,
    /// `HTTP_TIMEOUT` (seconds). Validation failure here is fatal: the
    /// process must not serve traffic with a bad backend URL or port.
    pub fn load() -> Result<Self, AppError> {
        info!("Loading configuration from environment variables");

        let backend_host = env_or("BACKEND_HOST", DEFAULT_BACKEND_HOST);
        let port = env_or("PORT", DEFAULT_PORT);
        let whitelist_file = env_or("WHITELIST_FILE", DEFAULT_WHITELIST_FILE);
        let timeout = timeout_from_env("HTTP_TIMEOUT", Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        Self::build(backend_host, &port, whitelist_file, timeout)
    }

    fn build(
        backend_host: String,
        port: &str,
        whitelist_file: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        if backend_host.is_empty() {
            return Err(AppError::Config("backend host cannot be empty".to_string()));
        }
        if !backend_host.starts_with("http://") && !backend_host.starts_with("https://") {
            return Err(AppError::Config(
                "backend host must start with http:// or https://".to_string(),
            ));
        }
        Url::parse(&backend_host)
            .map_err(|e| AppError::Config(format!("backend host is not a valid URL: {}", e)))?;

        let port: u16 = match port.parse() {
            Ok(p) if p >= 1 => p,
            _ => {
                return Err(AppError::Config(
                    "port must be a valid number between 1 and 65535".to_string(),
                ))
            }
        };

        if whitelist_file.is_empty() {
            return Err(AppError::Config(
                "whitelist file path cannot be empty".to_string(),
            ));
        }

        if timeout.is_zero() {
            return Err(AppError::Config("timeout must be greater than 0".to_string()));
        }

        let config = Self {
            backend_host,
            port,
            whitelist_file,
            timeout,
        };

        debug!(
            "Configuration loaded: backend_host={}, port={}, whitelist_file={}, timeout={:?}",
            config.backend_host, config.port, config.whitelist_file, config.timeout
        );

        Ok(config)
    }

    /// Full backend API base URL: host with any trailing slash trimmed,
    /// plus the `/api/v2` suffix.
    pub fn backend_api_url(&self) -> String {
        let host = self
            .backend_host
            .strip_suffix('/')
            .unwrap_or(&self.backend_host);
        format!("{}/api/v2", host)
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

/// Parse a timeout in whole seconds from the environment. Non-numeric or
/// non-positive values fall back to the default rather than failing startup.
fn timeout_from_env(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(value) => match value.parse::<u64>() {
            Ok(seconds) if seconds > 0 => Duration::from_secs(seconds),
            _ => default,
        },
        Err(_) => default,
    }
}
