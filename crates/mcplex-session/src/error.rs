//! The error surface `Kernel::request` and friends can fail with.

use mcplex_protocol::RpcError;
use mcplex_transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("request was cancelled")]
    Cancelled,

    #[error("connection closed")]
    ConnectionClosed,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<SessionError> for RpcError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Rpc(e) => e,
            SessionError::Cancelled => {
                RpcError::new(mcplex_protocol::ErrorCode::InternalError, "request was cancelled")
            }
            SessionError::ConnectionClosed => {
                RpcError::new(mcplex_protocol::ErrorCode::InternalError, "connection closed")
            }
            SessionError::Transport(e) => {
                RpcError::new(mcplex_protocol::ErrorCode::InternalError, e.to_string())
            }
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
