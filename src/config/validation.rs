//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Reject accept headers that would clash with the handshake's own headers
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use http::header::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::handshake::response::is_protocol_header;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error(
        "exchange.max_pending_bytes ({pending}) must be at least exchange.buffer_size ({buffer})"
    )]
    PendingBelowBuffer { pending: usize, buffer: usize },

    #[error("handshake.path '{0}' must start with '/'")]
    RelativePath(String),

    #[error("handshake.accept_headers: invalid header '{0}'")]
    InvalidHeader(String),

    #[error("handshake.accept_headers: '{0}' is set by the handshake itself")]
    ReservedHeader(String),
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }

    if config.exchange.buffer_size == 0 {
        errors.push(ValidationError::Zero("exchange.buffer_size"));
    }
    if config.exchange.max_pending_bytes < config.exchange.buffer_size {
        errors.push(ValidationError::PendingBelowBuffer {
            pending: config.exchange.max_pending_bytes,
            buffer: config.exchange.buffer_size,
        });
    }

    if let Some(path) = config.handshake.required_path() {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativePath(path.to_string()));
        }
    }

    for (name, value) in &config.handshake.accept_headers {
        let parsed = HeaderName::from_bytes(name.as_bytes());
        if parsed.is_err() || HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeader(name.clone()));
        } else if is_protocol_header(name) {
            errors.push(ValidationError::ReservedHeader(name.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
