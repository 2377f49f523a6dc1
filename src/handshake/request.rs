//! The request view the handshake operates on.

use http::request::Parts;
use http::Method;

use crate::handshake::headers::HeaderTable;

/// An inbound HTTP request reduced to what the opening handshake inspects.
///
/// Built once from the parsed request head and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    method: Method,
    path: String,
    headers: HeaderTable,
}

impl IncomingRequest {
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderTable) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// URL path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    /// Shorthand for `headers().get(name)`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

impl<B> From<&http::Request<B>> for IncomingRequest {
    fn from(req: &http::Request<B>) -> Self {
        Self::new(
            req.method().clone(),
            req.uri().path(),
            HeaderTable::from(req.headers()),
        )
    }
}

impl From<&Parts> for IncomingRequest {
    fn from(parts: &Parts) -> Self {
        Self::new(
            parts.method.clone(),
            parts.uri.path(),
            HeaderTable::from(&parts.headers),
        )
    }
}
