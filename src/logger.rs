use std::fs;
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn log_dir() -> Result<PathBuf, std::io::Error> {
    let dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let dir = PathBuf::from(dir);
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Initialize the logging system: console output plus a daily-rolling file.
///
/// Log level is controlled via `RUST_LOG` (default `info`). Failure to set
/// up the file layer degrades to console-only logging; it never prevents the
/// service from starting.
pub fn init_logger() {
    // Bridge log-macro records into tracing.
    let _ = tracing_log::LogTracer::init();

    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir() {
        Ok(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "explorer-proxy.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = fmt::Layer::new()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_level(true);

            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(console_layer)
                .with(file_layer)
                .try_init();

            // The guard must live until process exit for the non-blocking
            // writer to keep flushing.
            std::mem::forget(guard);
        }
        Err(e) => {
            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(console_layer)
                .try_init();
            tracing::warn!("Failed to create log directory, file logging disabled: {}", e);
        }
    }

    info!("Logger initialized (console + file persistence)");
}
