//! HTTP server setup for the handshake endpoint.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Serve each connection with hyper's HTTP/1.1 server (upgrades enabled)
//! - Feed every request to the connection's `UpgradeCoordinator`
//! - Hand upgraded streams to the exchange loop
//! - Stop accepting and drain connections on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::exchange::ExchangeSettings;
use crate::handshake::{
    HandshakeError, HandshakeOutcome, HandshakePolicy, HandshakeResponse, IncomingRequest,
    UpgradeCoordinator,
};
use crate::http::upgrade::{spawn_exchange, ConnectionSlot};
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionId, ConnectionPermit, ConnectionTracker, Listener, ListenerError};

/// Pause after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// WebSocket handshake server.
pub struct HandshakeServer {
    policy: Arc<HandshakePolicy>,
    exchange: ExchangeSettings,
    header_read_timeout: Option<Duration>,
    shutdown_grace: Duration,
    tracker: ConnectionTracker,
}

impl HandshakeServer {
    /// Create a new server from a validated configuration.
    pub fn new(config: &ServerConfig) -> Self {
        let header_read_secs = config.timeouts.header_read_secs;
        Self {
            policy: Arc::new(HandshakePolicy::from(&config.handshake)),
            exchange: ExchangeSettings::from_config(config),
            header_read_timeout: (header_read_secs > 0)
                .then(|| Duration::from_secs(header_read_secs)),
            shutdown_grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Tracker of open connections, including upgraded ones.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Run the accept loop until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            path = self.policy.required_path().unwrap_or("*"),
            "Handshake server starting"
        );

        let mut stop = shutdown.subscribe();
        loop {
            tokio::select! {
                _ = stop.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        self.spawn_connection(stream, peer_addr, permit, &shutdown);
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Stopped accepting connections"
        );

        if !self.tracker.wait_for_drain(self.shutdown_grace).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Shutdown grace period elapsed with connections still open"
            );
        }

        tracing::info!("Handshake server stopped");
        Ok(())
    }

    fn spawn_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        permit: ConnectionPermit,
        shutdown: &Shutdown,
    ) {
        let guard = self.tracker.track();
        let id = guard.id();
        let ctx = Arc::new(ConnectionContext {
            id,
            handshake: Mutex::new(PendingHandshake::new(
                UpgradeCoordinator::new(id, Arc::clone(&self.policy)),
                shutdown,
            )),
            slot: Arc::new(ConnectionSlot::new(permit, guard)),
            exchange: self.exchange,
        });

        let span = tracing::info_span!("connection", connection_id = %id, peer_addr = %peer_addr);
        let stop = shutdown.subscribe();
        let header_read_timeout = self.header_read_timeout;
        tokio::spawn(serve_connection(stream, ctx, header_read_timeout, stop).instrument(span));
    }
}

/// Per-connection state shared with the request service.
struct ConnectionContext {
    id: ConnectionId,
    handshake: Mutex<PendingHandshake>,
    slot: Arc<ConnectionSlot>,
    exchange: ExchangeSettings,
}

struct PendingHandshake {
    coordinator: UpgradeCoordinator,
    /// Subscribed when the connection is accepted, so a stop that lands
    /// while the 101 is in flight still reaches the exchange loop.
    exchange_stop: Option<broadcast::Receiver<()>>,
}

impl PendingHandshake {
    fn new(coordinator: UpgradeCoordinator, shutdown: &Shutdown) -> Self {
        Self {
            coordinator,
            exchange_stop: Some(shutdown.subscribe()),
        }
    }

    /// Run the handshake; an upgrade also yields the exchange loop's stop receiver.
    fn resolve(
        &mut self,
        req: &IncomingRequest,
    ) -> Result<(HandshakeOutcome, Option<broadcast::Receiver<()>>), HandshakeError> {
        let outcome = self.coordinator.handle(req)?;
        let stop = if outcome.is_upgraded() {
            self.exchange_stop.take()
        } else {
            None
        };
        Ok((outcome, stop))
    }
}

impl ConnectionContext {
    async fn respond(
        &self,
        mut req: Request<Incoming>,
    ) -> Result<HandshakeResponse, HandshakeError> {
        let incoming = IncomingRequest::from(&req);
        let (outcome, exchange_stop) = self.handshake.lock().await.resolve(&incoming)?;

        match (outcome, exchange_stop) {
            (HandshakeOutcome::Upgraded { token, response }, Some(stop)) => {
                tracing::debug!(accept = %token, "Switching protocols");
                let on_upgrade = hyper::upgrade::on(&mut req);
                spawn_exchange(self.id, on_upgrade, Arc::clone(&self.slot), self.exchange, stop);
                Ok(response)
            }
            (outcome, _) => Ok(outcome.into_response()),
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    ctx: Arc<ConnectionContext>,
    header_read_timeout: Option<Duration>,
    mut stop: broadcast::Receiver<()>,
) {
    let service = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .service_fn(move |req: Request<Incoming>| {
            let ctx = Arc::clone(&ctx);
            async move { ctx.respond(req).await }
        });

    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new());
    if let Some(timeout) = header_read_timeout {
        builder.header_read_timeout(timeout);
    }

    let conn = builder
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
        .with_upgrades();
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = stop.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Connection ended with error");
    }
}
