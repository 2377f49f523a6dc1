//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::Listener)
//!     → server.rs (hyper HTTP/1.1 connection, trace layer)
//!     → handshake::UpgradeCoordinator (one verdict, one response)
//!     → upgrade.rs (wait for the 101 to flush, take the raw stream)
//!     → exchange::run_exchange
//! ```

pub mod server;
pub mod upgrade;

pub use server::HandshakeServer;
