//! # API-Sports Gateway - Main Entry Point
//!
//! Loads configuration, installs logging, and serves until SIGINT or SIGTERM.
//! In-flight requests are drained before the process exits.

use tokio::signal;
use tracing::{error, info};

use apisports_gateway::observability::init_logging;
use apisports_gateway::{GatewayConfig, GatewayResult, GatewayServer};

#[tokio::main]
async fn main() -> GatewayResult<()> {
    let config = match GatewayConfig::load().await {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);

    info!("🚀 Starting API-Sports Gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let server = GatewayServer::new(config).map_err(|e| {
        error!("Failed to build gateway: {}", e);
        e
    })?;

    info!("🌐 Gateway ready on {}", server.bind_addr());

    server.start(shutdown_signal()).await?;

    info!("✅ Gateway shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📡 Received SIGINT (Ctrl+C), initiating graceful shutdown...");
        }
        _ = terminate => {
            info!("📡 Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
