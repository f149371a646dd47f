//! ONVIF device server binary.
//!
//! Run with: `onvif-device-server --config config.yaml`

use anyhow::{Context, Result};
use clap::Parser;
use onvif_device_server::{server, ServerConfig};
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// ONVIF device-side SOAP server.
///
/// Serves the device and media services over HTTP with optional
/// WS-UsernameToken authentication.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override settings.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override settings.port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Starting ONVIF device server v{}", env!("CARGO_PKG_VERSION"));
    info!("Config file: {}", args.config.display());

    // Load configuration
    let mut config = if args.config.exists() {
        let content = tokio::fs::read_to_string(&args.config)
            .await
            .context("Failed to read config file")?;
        ServerConfig::from_yaml(&content).context("Failed to load config file")?
    } else {
        info!("Config file not found, using defaults");
        ServerConfig::default()
    };

    if let Some(bind) = args.bind {
        config.settings.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.settings.port = port;
    }

    info!(
        bind_address = %config.settings.bind_address,
        port = config.settings.port,
        require_auth = config.auth.require_auth,
        users = config.auth.users.len(),
        profiles = config.profiles.len(),
        ptz_enabled = config.services.ptz_enabled,
        "Configuration loaded"
    );

    if config.auth.require_auth && config.auth.users.is_empty() {
        warn!("Authentication is required but no users are configured");
    }

    server::serve(&config, shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server");
}
