//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, handshake state machine, tracking)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     AwaitingRequest → HandshakeInProgress → Upgraded | Aborted
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - State transitions are one-directional and checked

pub mod connection;
pub mod listener;

pub use connection::{
    ConnectionGuard, ConnectionId, ConnectionLifecycle, ConnectionState, ConnectionTracker,
    TransitionError,
};
pub use listener::{ConnectionPermit, Listener, ListenerError};
