//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Bind the listener and begin accepting traffic
//! - Translate OS signals into a shutdown trigger
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::ServerConfig;
use crate::http::HandshakeServer;
use crate::lifecycle::signals::wait_for_signal;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("metrics exporter: {0}")]
    Metrics(String),

    #[error("server: {0}")]
    Server(#[from] std::io::Error),
}

/// Run the server with the given configuration until a stop signal arrives.
pub async fn run(config: ServerConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e| StartupError::Metrics(format!("{}", e)))?;
        metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
        tracing::info!(address = %addr, "Metrics exporter listening");
    }

    let listener = Listener::bind(&config.listener).await?;
    let server = HandshakeServer::new(&config);

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        tracing::info!(signal, "Shutdown requested");
        trigger.trigger();
    });

    server.run(listener, shutdown).await?;
    Ok(())
}
