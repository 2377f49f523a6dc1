//! WebSocket opening-handshake server library.

pub mod config;
pub mod exchange;
pub mod handshake;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServerConfig;
pub use crate::http::HandshakeServer;
pub use lifecycle::Shutdown;
