//! Supported protocol version negotiation (spec §6, §8).
//!
//! Versions are opaque `YYYY-MM-DD` date-string tags; implementations must
//! not parse or compare them as dates. The only per-process global state
//! this SDK carries is this list (spec §9 "Global state").

use crate::error::Error;

/// Ordered newest-first. `negotiate` returns the requested version
/// verbatim if supported, so it has no bearing on ordering; the ordering
/// only affects the order versions are listed in an error message.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-11-25", "2025-06-18", "2025-03-26"];

/// The version a fresh session negotiates to when acting as the
/// initiating client, absent any other preference.
pub const LATEST_PROTOCOL_VERSION: &str = SUPPORTED_PROTOCOL_VERSIONS[0];

/// Validates a client-requested protocol version during `initialize`
/// (spec §4.4 handshake). Returns the same string back so the caller can
/// echo it in the `InitializeResult` without re-allocating.
pub fn negotiate(requested: &str) -> Result<&'static str, Error> {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .find(|&&v| v == requested)
        .copied()
        .ok_or_else(|| Error::UnsupportedVersion {
            requested: requested.to_string(),
            supported: SUPPORTED_PROTOCOL_VERSIONS.iter().map(|s| s.to_string()).collect(),
        })
}
