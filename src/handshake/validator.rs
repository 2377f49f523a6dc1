//! Opening handshake validation.
//!
//! # Responsibilities
//! - Classify a request as an acceptable upgrade or a rejection
//! - Advertise the supported version on version mismatch (RFC 6455 §4.4)
//!
//! # Design Decisions
//! - Classification is a pure function of the request
//! - Rules run in a fixed order and the first failure wins
//! - `Upgrade` and `Connection` values compare ASCII case-insensitively;
//!   `Connection` is read as a comma-separated token list

use std::fmt;

use http::{Method, StatusCode};

use crate::handshake::headers::HeaderTable;
use crate::handshake::request::IncomingRequest;

/// The only protocol version this server speaks.
pub const SUPPORTED_VERSION: &str = "13";

pub const SEC_WEBSOCKET_VERSION: &str = "Sec-WebSocket-Version";
pub const SEC_WEBSOCKET_KEY: &str = "Sec-WebSocket-Key";
pub const SEC_WEBSOCKET_ACCEPT: &str = "Sec-WebSocket-Accept";

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A mandatory path is configured and the request targets another one.
    PathMismatch,
    /// `Sec-WebSocket-Version` is absent or not the supported value.
    VersionMismatch,
    /// A required header is absent or carries an unacceptable value.
    MissingRequiredHeader(&'static str),
    /// The method is not `GET`.
    WrongMethod,
}

impl RejectReason {
    /// Short label used in logs and metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RejectReason::PathMismatch => "path_mismatch",
            RejectReason::VersionMismatch => "version_mismatch",
            RejectReason::MissingRequiredHeader(_) => "missing_header",
            RejectReason::WrongMethod => "wrong_method",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::PathMismatch => write!(f, "request path does not match"),
            RejectReason::VersionMismatch => write!(f, "unsupported websocket version"),
            RejectReason::MissingRequiredHeader(name) => {
                write!(f, "missing or invalid {} header", name)
            }
            RejectReason::WrongMethod => write!(f, "method must be GET"),
        }
    }
}

/// Outcome of classifying one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeVerdict {
    Accept {
        client_key: String,
    },
    Reject {
        status: StatusCode,
        extra_headers: HeaderTable,
        reason: RejectReason,
    },
}

impl HandshakeVerdict {
    /// A 400 rejection with no extra headers.
    pub fn bad_request(reason: RejectReason) -> Self {
        HandshakeVerdict::Reject {
            status: StatusCode::BAD_REQUEST,
            extra_headers: HeaderTable::new(),
            reason,
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, HandshakeVerdict::Accept { .. })
    }
}

/// Classify a request against the RFC 6455 opening handshake rules.
///
/// The path rule is not applied here; the coordinator checks it first.
pub fn classify(req: &IncomingRequest) -> HandshakeVerdict {
    if req.header(SEC_WEBSOCKET_VERSION) != Some(SUPPORTED_VERSION) {
        let mut extra_headers = HeaderTable::new();
        extra_headers.insert(SEC_WEBSOCKET_VERSION, SUPPORTED_VERSION);
        return HandshakeVerdict::Reject {
            status: StatusCode::BAD_REQUEST,
            extra_headers,
            reason: RejectReason::VersionMismatch,
        };
    }

    if !has_value(req, "Host") {
        return HandshakeVerdict::bad_request(RejectReason::MissingRequiredHeader("Host"));
    }

    if *req.method() != Method::GET {
        return HandshakeVerdict::bad_request(RejectReason::WrongMethod);
    }

    let upgrade_ok = req
        .header("Upgrade")
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    if !upgrade_ok {
        return HandshakeVerdict::bad_request(RejectReason::MissingRequiredHeader("Upgrade"));
    }

    let connection_ok = req
        .header("Connection")
        .is_some_and(|v| has_token(v, "upgrade"));
    if !connection_ok {
        return HandshakeVerdict::bad_request(RejectReason::MissingRequiredHeader("Connection"));
    }

    match req.header(SEC_WEBSOCKET_KEY) {
        Some(key) if !key.is_empty() => HandshakeVerdict::Accept {
            client_key: key.to_string(),
        },
        _ => HandshakeVerdict::bad_request(RejectReason::MissingRequiredHeader(SEC_WEBSOCKET_KEY)),
    }
}

fn has_value(req: &IncomingRequest, name: &str) -> bool {
    req.header(name).is_some_and(|v| !v.is_empty())
}

fn has_token(value: &str, token: &str) -> bool {
    value
        .split(',')
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}
