//! The exchange loop run on an upgraded stream.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::exchange::codec::{CodecError, FrameCodec};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;

/// Limits applied to every exchange loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeSettings {
    /// Bytes requested per read.
    pub buffer_size: usize,
    /// Maximum undecoded bytes a codec may hold back.
    pub max_pending_bytes: usize,
    /// Per read/write inactivity limit; `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl ExchangeSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        let idle_secs = config.timeouts.idle_secs;
        Self {
            buffer_size: config.exchange.buffer_size,
            max_pending_bytes: config.exchange.max_pending_bytes,
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
        }
    }
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

/// Why an exchange loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its write half.
    PeerClosed,
    /// No traffic within the idle timeout.
    IdleTimeout,
    /// The server is shutting down.
    Shutdown,
}

/// Errors that end an exchange loop early.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("{pending} undecoded bytes exceed the limit of {limit}")]
    PendingOverflow { pending: usize, limit: usize },
}

/// Traffic counters for a finished exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeSummary {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub close_reason: CloseReason,
}

/// Run the exchange loop until the peer leaves, the stream fails, the idle
/// timeout fires or shutdown is signalled.
///
/// The stream is shut down before returning on every path.
pub async fn run_exchange<S, C>(
    id: ConnectionId,
    stream: S,
    codec: C,
    settings: ExchangeSettings,
    shutdown: broadcast::Receiver<()>,
) -> Result<ExchangeSummary, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: FrameCodec,
{
    let mut session = Session {
        stream,
        codec,
        settings,
        bytes_in: 0,
        bytes_out: 0,
    };

    let result = session.pump(shutdown).await;
    if let Err(e) = session.stream.shutdown().await {
        tracing::trace!(connection_id = %id, error = %e, "Stream shutdown failed");
    }

    result.map(|close_reason| ExchangeSummary {
        bytes_in: session.bytes_in,
        bytes_out: session.bytes_out,
        close_reason,
    })
}

struct Session<S, C> {
    stream: S,
    codec: C,
    settings: ExchangeSettings,
    bytes_in: u64,
    bytes_out: u64,
}

impl<S, C> Session<S, C>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: FrameCodec,
{
    async fn pump(
        &mut self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<CloseReason, ExchangeError> {
        let mut read_buf = vec![0u8; self.settings.buffer_size];
        let mut pending = BytesMut::new();
        let mut outbound = BytesMut::new();

        let idle = self.settings.idle_timeout;
        loop {
            let read = tokio::select! {
                _ = shutdown.recv() => return Ok(CloseReason::Shutdown),
                read = with_idle(idle, self.stream.read(&mut read_buf)) => read,
            };

            let n = match read? {
                Some(0) => return Ok(CloseReason::PeerClosed),
                Some(n) => n,
                None => return Ok(CloseReason::IdleTimeout),
            };
            self.bytes_in += n as u64;
            metrics::record_exchange_bytes("in", n as u64);

            pending.extend_from_slice(&read_buf[..n]);
            while let Some(frame) = self.codec.decode(&mut pending)? {
                self.codec.encode(frame, &mut outbound)?;
            }
            if pending.len() > self.settings.max_pending_bytes {
                return Err(ExchangeError::PendingOverflow {
                    pending: pending.len(),
                    limit: self.settings.max_pending_bytes,
                });
            }

            if !outbound.is_empty() {
                let written = outbound.len();
                if with_idle(idle, self.stream.write_all(&outbound)).await?.is_none() {
                    return Ok(CloseReason::IdleTimeout);
                }
                outbound.clear();
                self.bytes_out += written as u64;
                metrics::record_exchange_bytes("out", written as u64);
            }
        }
    }
}

/// Await `fut`, yielding `Ok(None)` if `limit` elapses first.
async fn with_idle<T, F>(limit: Option<Duration>, fut: F) -> io::Result<Option<T>>
where
    F: std::future::Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        },
        None => fut.await.map(Some),
    }
}
