use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use explorer_proxy::config::Config;
use explorer_proxy::logger;
use explorer_proxy::models::TokenWhitelist;
use explorer_proxy::proxy::server::{AppState, ProxyServer};
use explorer_proxy::proxy::upstream::client::BackendClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_logger();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            error!("Failed to load configuration: {}", err);
            return Err(err.into());
        }
    };

    let backend =
        Arc::new(BackendClient::new(&config).context("failed to build backend HTTP client")?);

    // A broken whitelist file must not keep the proxy down; it degrades to an
    // empty (unrestricted) whitelist instead.
    let whitelist = Arc::new(TokenWhitelist::new());
    if let Err(err) = whitelist.load_from_path(&config.whitelist_file).await {
        error!(
            "Failed to load whitelist from {}, continuing with empty whitelist: {}",
            config.whitelist_file, err
        );
    }

    info!(
        "Starting {} on port {} (backend: {}, whitelist: {} addresses from {}, timeout: {:?})",
        explorer_proxy::SERVICE_NAME,
        config.port,
        config.backend_api_url(),
        whitelist.size().await,
        config.whitelist_file,
        config.timeout
    );

    let state = AppState { backend, whitelist };
    let (server, handle) = ProxyServer::start(&config, state).await?;

    info!("Server started successfully, waiting for shutdown signal");
    shutdown_signal().await;

    info!("Shutdown signal received, stopping server");
    server.stop();
    let _ = handle.await;
    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
