//! Server-wide stop signal.
//!
//! The accept loop, every connection still negotiating its handshake and
//! every exchange loop hold a receiver. A receiver taken before `trigger`
//! observes the signal even if it only polls afterwards.

use tokio::sync::broadcast;

/// Cloneable handle that fans one stop signal out to all server tasks.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Register a task; take the receiver before the task starts waiting.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Tell every registered task to stop. Harmless with no receivers.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut accept_loop = shutdown.subscribe();
        let mut exchange = shutdown.clone().subscribe();

        shutdown.trigger();
        assert!(accept_loop.recv().await.is_ok());
        assert!(exchange.recv().await.is_ok());
    }

    #[test]
    fn trigger_without_subscribers_is_harmless() {
        Shutdown::new().trigger();
    }
}
