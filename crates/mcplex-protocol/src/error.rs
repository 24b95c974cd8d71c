//! JSON-RPC error codes and the crate's own error type (spec §6, §7).
//!
//! Two distinct things live here: [`RpcError`], the wire-level
//! `{code, message, data}` object carried inside an error [`Response`], and
//! [`Error`], the Rust-side error this crate's own fallible functions
//! return. Every crate above this one converts its local error type into
//! [`Error`] via `From`, and [`Error`] converts into [`RpcError`] at the
//! point a handler result is written back onto the wire.
//!
//! [`Response`]: crate::envelope::Response

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved JSON-RPC codes (spec §6) plus the MCP domain range
/// (-32000..-32099).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// A domain error in the reserved -32000..-32099 MCP range.
    Domain(i32),
    /// Anything else an implementation wants to signal.
    Other(i32),
}

impl ErrorCode {
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::Domain(code) => code,
            Self::Other(code) => code,
        }
    }

    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::Domain(_) | Self::Other(_) => "Application error",
        }
    }

    /// The MCP domain range reserved for protocol errors like
    /// `ResourceNotFound` that aren't one of the five standard codes.
    pub const RESOURCE_NOT_FOUND: Self = Self::Domain(-32001);
    pub const CAPABILITY_NOT_SUPPORTED: Self = Self::Domain(-32002);
    pub const UNSUPPORTED_PROTOCOL_VERSION: Self = Self::Domain(-32003);
    pub const NOT_OPERATIONAL: Self = Self::Domain(-32004);
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            c @ -32099..=-32000 => Self::Domain(c),
            other => Self::Other(other),
        }
    }
}

/// The wire-level error object carried in an error [`Response`](crate::envelope::Response).
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("method not found: {method}"))
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, detail)
    }

    pub fn resource_not_found(uri: &str) -> Self {
        Self::new(ErrorCode::RESOURCE_NOT_FOUND, format!("resource not found: {uri}"))
    }

    pub fn capability_not_supported(capability: &str) -> Self {
        Self::new(
            ErrorCode::CAPABILITY_NOT_SUPPORTED,
            format!("peer did not advertise capability: {capability}"),
        )
    }

    pub fn not_operational() -> Self {
        Self::new(
            ErrorCode::NOT_OPERATIONAL,
            "session is not yet operational (handshake incomplete)",
        )
    }
}

/// This crate's own error type, covering malformed frames, version
/// negotiation failure, and serialization failures — the things that can
/// go wrong below the level of "a handler returned an error" (spec §7,
/// surface 1 and 3).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error(
        "unsupported protocol version \"{requested}\"; supported versions: {}",
        supported.join(", ")
    )]
    UnsupportedVersion {
        requested: String,
        supported: Vec<String>,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        match err {
            Error::MalformedFrame(detail) => RpcError::new(ErrorCode::InvalidRequest, detail),
            Error::UnsupportedVersion { requested, supported } => RpcError::new(
                ErrorCode::UNSUPPORTED_PROTOCOL_VERSION,
                format!(
                    "unsupported protocol version \"{requested}\"; supported: {}",
                    supported.join(", ")
                ),
            ),
            Error::Serialization(e) => RpcError::new(ErrorCode::ParseError, e.to_string()),
            Error::Rpc(e) => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_round_trips_through_i32() {
        assert_eq!(ErrorCode::from(-32601).code(), ErrorCode::MethodNotFound.code());
        assert_eq!(ErrorCode::from(-32001), ErrorCode::Domain(-32001));
    }

    #[test]
    fn unsupported_version_lists_the_supported_set() {
        let err = Error::UnsupportedVersion {
            requested: "1999-01-01".into(),
            supported: vec!["2025-06-18".into(), "2025-11-25".into()],
        };
        let message = err.to_string();
        assert!(message.contains("1999-01-01"));
        assert!(message.contains("2025-06-18"));
    }
}
