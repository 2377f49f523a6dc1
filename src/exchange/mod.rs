//! Post-upgrade exchange phase.
//!
//! # Data Flow
//! ```text
//! Upgraded stream (owned, moved here exactly once)
//!     → session.rs (bounded read → codec.decode → codec.encode → write)
//!     → codec.rs (frame codec seam; Passthrough echoes bytes)
//! ```
//!
//! # Design Decisions
//! - The loop never touches handshake state
//! - Any I/O or codec failure closes this stream only
//! - Idle timeout and shutdown both end the loop cleanly

pub mod codec;
pub mod session;

pub use codec::{CodecError, FrameCodec, Passthrough};
pub use session::{run_exchange, CloseReason, ExchangeError, ExchangeSettings, ExchangeSummary};
