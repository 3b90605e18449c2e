//! ws-relay service
//!
//! Starts the connection supervisor as a background task, serves the HTTP
//! surface in the foreground, and shuts both down on SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ws_relay::config::Settings;
use ws_relay::http;
use ws_relay::relay::{ConnectionSupervisor, SupervisorConfig};

/// ws-relay service
///
/// HTTP service with a supervised outbound WebSocket relay connection
#[derive(Parser, Debug)]
#[command(name = "ws-relay")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relay endpoint to connect to (overrides the settings file)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// HTTP port to listen on (overrides the settings file)
    #[arg(short, long)]
    port: Option<u16>,

    /// HTTP bind address (overrides the settings file)
    #[arg(long)]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("ws-relay v{}", env!("CARGO_PKG_VERSION"));

    // Assemble settings: file first, then CLI overrides
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(endpoint) = args.endpoint {
        settings.endpoint = endpoint;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }

    let supervisor_config =
        SupervisorConfig::new(settings.endpoint.clone()).with_backoff(settings.backoff());
    let supervisor = Arc::new(ConnectionSupervisor::new(supervisor_config));
    let http_shutdown = supervisor.shutdown_signal();

    // Start the supervisor once, as a background task; the HTTP surface
    // below is served independently of it.
    let supervisor_task = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    // Spawn shutdown signal handler
    let shutdown_handle = Arc::clone(&supervisor);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Initiating graceful shutdown...");
        shutdown_handle.shutdown();
    });

    // Serve HTTP until shutdown
    http::serve(&settings.socket_addr(), http_shutdown).await?;

    // Join the supervisor before exiting
    supervisor_task.await??;

    info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
