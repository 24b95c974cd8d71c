//! Server-side error surface.

use mcplex_protocol::{ErrorCode, RpcError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("prompt not found: {0}")]
    PromptNotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("peer did not advertise capability: {0}")]
    CapabilityNotSupported(String),

    #[error("request rejected by middleware: {0}")]
    MiddlewareRejected(String),

    #[error("handler timed out")]
    Timeout,

    #[error(transparent)]
    Session(#[from] mcplex_session::SessionError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl From<ServerError> for RpcError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::ResourceNotFound(uri) => RpcError::resource_not_found(&uri),
            ServerError::PromptNotFound(name) => {
                RpcError::new(ErrorCode::RESOURCE_NOT_FOUND, format!("prompt not found: {name}"))
            }
            ServerError::InvalidArguments(detail) => RpcError::invalid_params(detail),
            ServerError::CapabilityNotSupported(capability) => {
                RpcError::capability_not_supported(&capability)
            }
            ServerError::MiddlewareRejected(detail) => {
                RpcError::new(ErrorCode::InternalError, detail)
            }
            ServerError::Timeout => RpcError::new(ErrorCode::InternalError, "handler timed out"),
            ServerError::Session(e) => e.into(),
            ServerError::Rpc(e) => e,
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
