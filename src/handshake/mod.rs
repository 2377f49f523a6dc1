//! WebSocket opening handshake (RFC 6455 §4).
//!
//! # Data Flow
//! ```text
//! Parsed request head (hyper)
//!     → request.rs (method, path, case-insensitive header table)
//!     → coordinator.rs (state machine, path pre-check)
//!     → validator.rs (classify: Accept | Reject)
//!     → accept.rs (Sec-WebSocket-Accept token)
//!     → response.rs (101 or abort response)
//!     → Exchange loop takes the upgraded stream
//! ```
//!
//! # Design Decisions
//! - Everything here is synchronous and free of I/O; the transport writes
//!   the response and performs the stream handoff
//! - Client mistakes become responses, never errors

pub mod accept;
pub mod coordinator;
pub mod error;
pub mod headers;
pub mod request;
pub mod response;
pub mod status;
pub mod validator;

pub use accept::{compute_accept, AcceptToken, WS_GUID};
pub use coordinator::{HandshakeOutcome, HandshakePolicy, UpgradeCoordinator};
pub use error::HandshakeError;
pub use headers::HeaderTable;
pub use request::IncomingRequest;
pub use response::{emit_abort, emit_accept, HandshakeResponse};
pub use status::status_text;
pub use validator::{classify, HandshakeVerdict, RejectReason, SUPPORTED_VERSION};
