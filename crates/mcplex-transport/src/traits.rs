//! The `Transport`/`Connection` contract the session kernel drives
//! (spec §4.2).

use async_trait::async_trait;
use mcplex_protocol::Envelope;

use crate::error::TransportResult;

/// Establishes a duplex [`Connection`]. A concrete transport (stdio, SSE)
/// is a factory for connections, not a connection itself, so the same
/// `Transport` value can in principle be reused to accept/open several
/// sessions (the SSE server side does exactly this).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> TransportResult<Box<dyn Connection>>;
}

/// A duplex frame stream. `Close` is idempotent; `Read`/`Write` return
/// [`TransportError::ConnectionClosed`](crate::TransportError::ConnectionClosed)
/// once closed, whether closed locally or by peer EOF.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn read(&self) -> TransportResult<Envelope>;
    async fn write(&self, envelope: &Envelope) -> TransportResult<()>;
    async fn close(&self) -> TransportResult<()>;

    /// Empty for point-to-point transports like stdio (spec §4.2.1).
    fn session_id(&self) -> Option<String> {
        None
    }
}
