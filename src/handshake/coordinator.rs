//! Per-connection upgrade coordination.
//!
//! # State Transitions
//! ```text
//! AwaitingRequest → HandshakeInProgress → Upgraded   (101 sent, stream handed off)
//!                                       → Aborted    (4xx sent, connection closed)
//! ```
//!
//! # Design Decisions
//! - One coordinator per TCP connection, one handshake per coordinator
//! - The path pre-check runs before header classification
//! - A second request on a resolved connection gets no response at all

use std::sync::Arc;

use http::StatusCode;

use crate::config::HandshakeConfig;
use crate::handshake::accept::{compute_accept, AcceptToken};
use crate::handshake::error::HandshakeError;
use crate::handshake::headers::HeaderTable;
use crate::handshake::request::IncomingRequest;
use crate::handshake::response::{emit_abort, emit_accept, HandshakeResponse};
use crate::handshake::validator::{classify, HandshakeVerdict, RejectReason};
use crate::net::connection::{ConnectionId, ConnectionLifecycle, ConnectionState};
use crate::observability::metrics;

/// Read-only handshake settings shared by every connection.
#[derive(Debug, Clone, Default)]
pub struct HandshakePolicy {
    required_path: Option<String>,
    accept_headers: HeaderTable,
}

impl HandshakePolicy {
    pub fn new(required_path: Option<String>, accept_headers: HeaderTable) -> Self {
        Self {
            required_path: required_path.filter(|p| !p.is_empty()),
            accept_headers,
        }
    }

    pub fn required_path(&self) -> Option<&str> {
        self.required_path.as_deref()
    }

    pub fn accept_headers(&self) -> &HeaderTable {
        &self.accept_headers
    }
}

impl From<&HandshakeConfig> for HandshakePolicy {
    fn from(config: &HandshakeConfig) -> Self {
        Self::new(
            config.required_path().map(str::to_string),
            config.accept_headers.iter().collect(),
        )
    }
}

/// Terminal result of a handshake, carrying the response to write.
#[derive(Debug)]
pub enum HandshakeOutcome {
    /// Write the 101 response, then hand the stream to the exchange loop.
    Upgraded {
        token: AcceptToken,
        response: HandshakeResponse,
    },
    /// Write the abort response, then close.
    Aborted {
        reason: RejectReason,
        response: HandshakeResponse,
    },
}

impl HandshakeOutcome {
    pub fn is_upgraded(&self) -> bool {
        matches!(self, HandshakeOutcome::Upgraded { .. })
    }

    pub fn into_response(self) -> HandshakeResponse {
        match self {
            HandshakeOutcome::Upgraded { response, .. } => response,
            HandshakeOutcome::Aborted { response, .. } => response,
        }
    }
}

/// Drives a single connection through its opening handshake.
#[derive(Debug)]
pub struct UpgradeCoordinator {
    policy: Arc<HandshakePolicy>,
    lifecycle: ConnectionLifecycle,
}

impl UpgradeCoordinator {
    pub fn new(id: ConnectionId, policy: Arc<HandshakePolicy>) -> Self {
        Self {
            policy,
            lifecycle: ConnectionLifecycle::new(id),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.lifecycle.id()
    }

    pub fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// Classify `req` and produce the one response this connection will send.
    ///
    /// Fails with [`HandshakeError::AlreadyResolved`] if a handshake was
    /// already answered on this connection.
    pub fn handle(&mut self, req: &IncomingRequest) -> Result<HandshakeOutcome, HandshakeError> {
        self.lifecycle.advance(ConnectionState::HandshakeInProgress)?;

        let verdict = match self.policy.required_path() {
            Some(path) if req.path() != path => {
                HandshakeVerdict::bad_request(RejectReason::PathMismatch)
            }
            _ => classify(req),
        };

        match verdict {
            HandshakeVerdict::Accept { client_key } => {
                let token = compute_accept(&client_key);
                let rendered = emit_accept(&token, self.policy.accept_headers());
                let response = self.abort_on_error(rendered)?;
                self.lifecycle.advance(ConnectionState::Upgraded)?;

                tracing::debug!(
                    connection_id = %self.id(),
                    path = %req.path(),
                    "Handshake accepted"
                );
                metrics::record_handshake("upgraded", "none");
                Ok(HandshakeOutcome::Upgraded { token, response })
            }
            HandshakeVerdict::Reject {
                status,
                extra_headers,
                reason,
            } => {
                let response = self.abort_on_error(emit_abort(status, &extra_headers))?;
                self.lifecycle.advance(ConnectionState::Aborted)?;

                log_rejection(self.id(), req, status, &reason);
                metrics::record_handshake("rejected", reason.as_label());
                Ok(HandshakeOutcome::Aborted { reason, response })
            }
        }
    }

    /// A response that cannot be built leaves the connection aborted without one.
    fn abort_on_error(
        &mut self,
        rendered: Result<HandshakeResponse, HandshakeError>,
    ) -> Result<HandshakeResponse, HandshakeError> {
        if let Err(e) = &rendered {
            tracing::error!(connection_id = %self.id(), error = %e, "Handshake response failed");
            let _ = self.lifecycle.advance(ConnectionState::Aborted);
        }
        rendered
    }
}

fn log_rejection(
    id: ConnectionId,
    req: &IncomingRequest,
    status: StatusCode,
    reason: &RejectReason,
) {
    tracing::info!(
        connection_id = %id,
        method = %req.method(),
        path = %req.path(),
        status = status.as_u16(),
        reason = %reason,
        "Handshake rejected"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    fn upgrade_request(path: &str, version: &str) -> IncomingRequest {
        let headers: HeaderTable = [
            ("Host", "x"),
            ("Upgrade", "websocket"),
            ("Connection", "Upgrade"),
            ("Sec-WebSocket-Key", KEY),
            ("Sec-WebSocket-Version", version),
        ]
        .into_iter()
        .collect();
        IncomingRequest::new(Method::GET, path, headers)
    }

    fn coordinator(path: Option<&str>) -> UpgradeCoordinator {
        let policy = HandshakePolicy::new(path.map(str::to_string), HeaderTable::new());
        UpgradeCoordinator::new(ConnectionId::new(), Arc::new(policy))
    }

    #[test]
    fn test_accept_transitions_to_upgraded() {
        let mut coord = coordinator(None);
        let outcome = coord.handle(&upgrade_request("/", "13")).unwrap();

        assert_eq!(coord.state(), ConnectionState::Upgraded);
        match outcome {
            HandshakeOutcome::Upgraded { token, response } => {
                assert_eq!(token.as_str(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
                assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
                assert_eq!(
                    response.headers()["sec-websocket-accept"],
                    "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
                );
            }
            other => panic!("expected upgrade, got {:?}", other),
        }
    }

    #[test]
    fn test_version_mismatch_aborts() {
        let mut coord = coordinator(None);
        let outcome = coord.handle(&upgrade_request("/", "8")).unwrap();

        assert_eq!(coord.state(), ConnectionState::Aborted);
        match outcome {
            HandshakeOutcome::Aborted { reason, response } => {
                assert_eq!(reason, RejectReason::VersionMismatch);
                assert_eq!(response.status(), StatusCode::BAD_REQUEST);
                assert_eq!(response.headers()["sec-websocket-version"], "13");
                assert_eq!(response.headers()["connection"], "close");
            }
            other => panic!("expected abort, got {:?}", other),
        }
    }

    #[test]
    fn test_path_gate() {
        let mut coord = coordinator(Some("/chat"));
        let outcome = coord.handle(&upgrade_request("/other", "13")).unwrap();
        match outcome {
            HandshakeOutcome::Aborted { reason, response } => {
                assert_eq!(reason, RejectReason::PathMismatch);
                assert_eq!(response.status(), StatusCode::BAD_REQUEST);
                assert!(response.headers().get("sec-websocket-version").is_none());
            }
            other => panic!("expected abort, got {:?}", other),
        }

        let mut coord = coordinator(Some("/chat"));
        assert!(coord.handle(&upgrade_request("/chat", "13")).unwrap().is_upgraded());
    }

    #[test]
    fn test_path_checked_before_headers() {
        let mut coord = coordinator(Some("/chat"));
        let outcome = coord.handle(&upgrade_request("/other", "8")).unwrap();
        assert!(matches!(
            outcome,
            HandshakeOutcome::Aborted {
                reason: RejectReason::PathMismatch,
                ..
            }
        ));
    }

    #[test]
    fn test_second_request_refused() {
        let mut coord = coordinator(None);
        assert!(coord.handle(&upgrade_request("/", "13")).unwrap().is_upgraded());

        let err = coord.handle(&upgrade_request("/", "13")).unwrap_err();
        assert!(matches!(err, HandshakeError::AlreadyResolved(_)));
        assert_eq!(coord.state(), ConnectionState::Upgraded);

        let mut coord = coordinator(None);
        assert!(!coord.handle(&upgrade_request("/", "1")).unwrap().is_upgraded());
        assert!(coord.handle(&upgrade_request("/", "13")).is_err());
        assert_eq!(coord.state(), ConnectionState::Aborted);
    }

    #[test]
    fn test_accept_headers_applied() {
        let mut config = HandshakeConfig::default();
        config.accept_headers.insert("Server".into(), "wsgate".into());
        let policy = Arc::new(HandshakePolicy::from(&config));

        let mut coord = UpgradeCoordinator::new(ConnectionId::new(), policy);
        let response = coord.handle(&upgrade_request("/", "13")).unwrap().into_response();
        assert_eq!(response.headers()["server"], "wsgate");
    }

    #[test]
    fn test_bad_accept_header_aborts_without_response() {
        let headers: HeaderTable = [("bad header", "x")].into_iter().collect();
        let policy = Arc::new(HandshakePolicy::new(None, headers));
        let mut coord = UpgradeCoordinator::new(ConnectionId::new(), policy);

        let err = coord.handle(&upgrade_request("/", "13")).unwrap_err();
        assert!(matches!(err, HandshakeError::Response(_)));
        assert_eq!(coord.state(), ConnectionState::Aborted);
    }
}
