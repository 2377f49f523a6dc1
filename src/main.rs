//! wsgate: WebSocket opening-handshake server.
//!
//! # Architecture Overview
//!
//! ```text
//! client ──▶ net::Listener ──▶ http::HandshakeServer ──▶ handshake::UpgradeCoordinator
//!                                                          │
//!               ◀── 400 abort, connection closed ──────────┤ Reject
//!               ◀── 101 Switching Protocols ───────────────┤ Accept
//!                                                          ▼
//!                                              exchange::run_exchange (echo)
//!
//! cross-cutting: config · lifecycle (signals, shutdown) · observability
//! ```

use std::path::PathBuf;

use clap::Parser;

use wsgate::config::{load_config, validate_config, ServerConfig};
use wsgate::lifecycle::startup;
use wsgate::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "wsgate")]
#[command(about = "WebSocket opening-handshake server", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overrides `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Mandatory request path, overrides `handshake.path`.
    #[arg(short, long)]
    path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(path) = cli.path {
        config.handshake.path = path;
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("invalid configuration: {}", error);
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    init_logging(&config.observability)?;

    tracing::info!("wsgate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        path = %config.handshake.path,
        idle_timeout_secs = config.timeouts.idle_secs,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
