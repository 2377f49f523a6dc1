//! Handshake error types.

use thiserror::Error;

use crate::net::connection::TransitionError;

/// Errors that stop a connection from getting a handshake response.
///
/// Client mistakes are not errors: they become 4xx responses. These cover
/// misuse of the state machine and failures to build the response itself.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The connection already answered a handshake.
    #[error("handshake already resolved: {0}")]
    AlreadyResolved(#[from] TransitionError),

    /// The response could not be built from the configured headers.
    #[error("failed to build handshake response: {0}")]
    Response(#[from] http::Error),
}
