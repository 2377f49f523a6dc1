//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track the handshake state of each connection
//!   (AwaitingRequest → HandshakeInProgress → Upgraded | Aborted)
//! - Generate unique connection IDs for tracing
//! - Count open connections for graceful shutdown

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handshake state of a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, no request seen yet.
    AwaitingRequest,
    /// A request is being classified.
    HandshakeInProgress,
    /// 101 sent; the stream belongs to the exchange loop.
    Upgraded,
    /// Abort response sent; the connection closes.
    Aborted,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Upgraded | ConnectionState::Aborted)
    }

    fn can_advance_to(self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::AwaitingRequest, ConnectionState::HandshakeInProgress)
                | (ConnectionState::HandshakeInProgress, ConnectionState::Upgraded)
                | (ConnectionState::HandshakeInProgress, ConnectionState::Aborted)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::AwaitingRequest => "awaiting-request",
            ConnectionState::HandshakeInProgress => "handshake-in-progress",
            ConnectionState::Upgraded => "upgraded",
            ConnectionState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// A transition the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid connection state transition {from} -> {to}")]
pub struct TransitionError {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// One-directional state holder for a connection.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    id: ConnectionId,
    state: ConnectionState,
}

impl ConnectionLifecycle {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            state: ConnectionState::AwaitingRequest,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `next`, refusing anything but the forward edges.
    pub fn advance(&mut self, next: ConnectionState) -> Result<(), TransitionError> {
        if !self.state.can_advance_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(
            connection_id = %self.id,
            from = %self.state,
            to = %next,
            "State transition"
        );
        self.state = next;
        Ok(())
    }
}

/// Tracks open connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    /// Current count of active connections.
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_connections(active);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until all connections are closed or the grace period ends.
    ///
    /// Returns `true` if every connection closed in time.
    pub async fn wait_for_drain(&self, grace: Duration) -> bool {
        let drained = async {
            while self.active_count.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(grace, drained).await.is_ok()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_active_connections(active);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
