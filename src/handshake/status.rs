//! Status code text used for reason phrases and abort bodies.

use http::StatusCode;

/// Canonical text for a status code, e.g. `"Bad Request"` for 400.
///
/// Reads the `http` crate's static reason table; codes without a registered
/// phrase fall back to `"Unknown Status"`.
pub fn status_text(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown Status")
}
