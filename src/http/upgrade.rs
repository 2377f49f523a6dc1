//! Handoff of an upgraded connection to the exchange loop.

use std::sync::Arc;

use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::exchange::{run_exchange, ExchangeSettings, Passthrough};
use crate::net::{ConnectionGuard, ConnectionId, ConnectionPermit};

/// Resources held for as long as a connection is open, across the handoff.
#[derive(Debug)]
pub struct ConnectionSlot {
    _permit: ConnectionPermit,
    _guard: ConnectionGuard,
}

impl ConnectionSlot {
    pub fn new(permit: ConnectionPermit, guard: ConnectionGuard) -> Self {
        Self {
            _permit: permit,
            _guard: guard,
        }
    }
}

/// Wait for hyper to finish writing the 101 response, then run the exchange
/// loop on the raw stream.
///
/// The slot is released when the exchange ends, which keeps the connection
/// counted while it is upgraded.
pub fn spawn_exchange(
    id: ConnectionId,
    on_upgrade: OnUpgrade,
    slot: Arc<ConnectionSlot>,
    settings: ExchangeSettings,
    shutdown: broadcast::Receiver<()>,
) {
    let task = async move {
        let _slot = slot;
        match on_upgrade.await {
            Ok(upgraded) => {
                tracing::debug!(connection_id = %id, "Connection upgraded");
                let stream = TokioIo::new(upgraded);
                match run_exchange(id, stream, Passthrough, settings, shutdown).await {
                    Ok(summary) => tracing::debug!(
                        connection_id = %id,
                        bytes_in = summary.bytes_in,
                        bytes_out = summary.bytes_out,
                        reason = ?summary.close_reason,
                        "Exchange finished"
                    ),
                    Err(e) => tracing::warn!(
                        connection_id = %id,
                        error = %e,
                        "Exchange failed, connection closed"
                    ),
                }
            }
            Err(e) => {
                tracing::warn!(connection_id = %id, error = %e, "Upgrade handoff failed");
            }
        }
    };
    tokio::spawn(task.instrument(tracing::Span::current()));
}
