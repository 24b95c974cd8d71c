//! Transport-level errors (spec §7, surface 3: "Transport/session
//! errors").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The sentinel returned by `Read`/`Write` after `Close()` or peer EOF
    /// (spec §4.2).
    #[error("connection closed")]
    ConnectionClosed,

    #[error("frame exceeded maximum size of {limit} bytes")]
    FrameTooLarge { limit: usize },

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error(transparent)]
    Protocol(#[from] mcplex_protocol::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out")]
    Timeout,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;
