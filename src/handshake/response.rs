//! Handshake response rendering.
//!
//! # Responsibilities
//! - Render the 101 Switching Protocols response for an accepted handshake
//! - Render the plain-text abort response for a rejected one
//!
//! # Design Decisions
//! - Abort bodies are always `text/plain` with the status text as body
//! - Aborts carry `Connection: close`; hyper closes the socket after writing
//! - Caller headers never override the headers the emitter sets itself

use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, UPGRADE};
use http::{Response, StatusCode};
use http_body_util::Full;

use crate::handshake::accept::AcceptToken;
use crate::handshake::error::HandshakeError;
use crate::handshake::headers::HeaderTable;
use crate::handshake::status::status_text;
use crate::handshake::validator::SEC_WEBSOCKET_ACCEPT;

/// Response type produced by the handshake.
pub type HandshakeResponse = Response<Full<Bytes>>;

/// Content type of every abort body.
pub const ABORT_CONTENT_TYPE: &str = "text/plain";

const PROTOCOL_HEADERS: [&str; 5] = [
    "upgrade",
    "connection",
    "sec-websocket-accept",
    "content-type",
    "content-length",
];

/// Whether the emitter owns this header name.
pub fn is_protocol_header(name: &str) -> bool {
    PROTOCOL_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Render the 101 response completing the handshake.
pub fn emit_accept(
    token: &AcceptToken,
    extra_headers: &HeaderTable,
) -> Result<HandshakeResponse, HandshakeError> {
    let mut builder = Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(UPGRADE, "websocket")
        .header(CONNECTION, "Upgrade")
        .header(SEC_WEBSOCKET_ACCEPT, token.as_str());

    for (name, value) in extra_headers.iter() {
        if !is_protocol_header(name) {
            builder = builder.header(name, value);
        }
    }

    Ok(builder.body(Full::new(Bytes::new()))?)
}

/// Render an abort response; the connection is closed once it is written.
pub fn emit_abort(
    status: StatusCode,
    extra_headers: &HeaderTable,
) -> Result<HandshakeResponse, HandshakeError> {
    let body = status_text(status);

    let mut builder = Response::builder()
        .status(status)
        .header(CONNECTION, "close")
        .header(CONTENT_TYPE, ABORT_CONTENT_TYPE)
        .header(CONTENT_LENGTH, body.len().to_string());

    for (name, value) in extra_headers.iter() {
        if !is_protocol_header(name) {
            builder = builder.header(name, value);
        }
    }

    Ok(builder.body(Full::new(Bytes::from_static(body.as_bytes())))?)
}
