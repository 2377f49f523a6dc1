//! Bounded TCP accept.
//!
//! # Responsibilities
//! - Bind the handshake port
//! - Cap open connections (handshaking and upgraded alike) at `max_connections`
//!
//! # Design Decisions
//! - A slot is reserved before `accept`, so excess clients queue in the
//!   kernel backlog instead of being accepted and dropped
//! - The slot travels with the connection as a `ConnectionPermit`

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("cannot bind handshake port: {0}")]
    Bind(io::Error),

    #[error("accept failed: {0}")]
    Accept(io::Error),

    #[error("connection slots are no longer available")]
    Closed,
}

/// Handshake port with a fixed number of connection slots.
pub struct Listener {
    socket: TcpListener,
    slots: Arc<Semaphore>,
}

impl Listener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| ListenerError::Bind(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let socket = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Ok(Self::from_tcp(socket, config.max_connections))
    }

    /// Use a socket bound elsewhere, e.g. on an ephemeral port.
    pub fn from_tcp(socket: TcpListener, max_connections: usize) -> Self {
        if let Ok(addr) = socket.local_addr() {
            tracing::info!(address = %addr, max_connections, "Handshake port open");
        }

        Self {
            socket,
            slots: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// Wait for a free slot, then for the next client.
    ///
    /// The returned permit must live as long as the connection does.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer_addr) = self.socket.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(
            peer_addr = %peer_addr,
            free_slots = self.slots.available_permits(),
            "Client connected"
        );

        Ok((stream, peer_addr, ConnectionPermit { _slot: slot }))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// One reserved connection slot; dropping it frees the slot.
#[derive(Debug)]
pub struct ConnectionPermit {
    _slot: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_slot_freed_when_permit_dropped() {
        let config = ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections: 1,
        };
        let listener = Listener::bind(&config).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _first = TcpStream::connect(addr).await.unwrap();
        let _second = TcpStream::connect(addr).await.unwrap();

        let (_stream, _, permit) = listener.accept().await.unwrap();

        // The only slot is taken, so the second client stays queued.
        let blocked = tokio::time::timeout(Duration::from_millis(50), listener.accept()).await;
        assert!(blocked.is_err());

        drop(permit);
        let accepted = tokio::time::timeout(Duration::from_secs(5), listener.accept()).await;
        assert!(matches!(accepted, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn test_bind_invalid_address() {
        let config = ListenerConfig {
            bind_address: "nowhere".into(),
            max_connections: 1,
        };
        assert!(matches!(
            Listener::bind(&config).await,
            Err(ListenerError::Bind(_))
        ));
    }
}
