//! Client-side error surface.

use mcplex_protocol::{ErrorCode, RpcError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("server did not advertise capability: {0}")]
    CapabilityNotSupported(String),

    #[error("no sampling handler registered")]
    NoSamplingHandler,

    #[error("no elicitation handler registered")]
    NoElicitationHandler,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Session(#[from] mcplex_session::SessionError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl From<ClientError> for RpcError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::CapabilityNotSupported(cap) => RpcError::capability_not_supported(&cap),
            ClientError::NoSamplingHandler => {
                RpcError::new(ErrorCode::MethodNotFound, "client has no sampling handler")
            }
            ClientError::NoElicitationHandler => {
                RpcError::new(ErrorCode::MethodNotFound, "client has no elicitation handler")
            }
            ClientError::Malformed(detail) => RpcError::new(ErrorCode::InvalidParams, detail),
            ClientError::Session(e) => e.into(),
            ClientError::Rpc(e) => e,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
