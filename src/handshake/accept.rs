//! `Sec-WebSocket-Accept` computation (RFC 6455 §4.2.2).

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha1::{Digest, Sha1};

/// GUID appended to the client key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Base64 of the SHA-1 digest of `client key + GUID`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AcceptToken(String);

impl AcceptToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AcceptToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the accept token for a client's `Sec-WebSocket-Key`.
///
/// ```
/// use wsgate::handshake::compute_accept;
///
/// let token = compute_accept("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(token.as_str(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept(client_key: &str) -> AcceptToken {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    AcceptToken(BASE64.encode(hasher.finalize()))
}
