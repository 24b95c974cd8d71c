//! A bidirectional Model Context Protocol session runtime: pluggable
//! transports (stdio, SSE/HTTP) underneath a symmetric JSON-RPC kernel,
//! with server- and client-side protocol layers built on top.
//!
//! This crate is a thin facade — the real work lives one layer down:
//!
//! - [`mcplex_types`]: wire-serializable domain types (content, tools,
//!   resources, prompts, capabilities, sampling/elicitation).
//! - [`mcplex_protocol`]: the JSON-RPC envelope, error codes, and
//!   protocol-version/capability negotiation.
//! - [`mcplex_transport`]: `Transport`/`Connection` plus the stdio and
//!   SSE/HTTP realizations.
//! - [`mcplex_session`]: the symmetric kernel, request correlator, and
//!   keep-alive loop shared by both sides.
//! - [`mcplex_server`]: tool/resource/prompt registries, the middleware
//!   chain, and server-side handshake/routing.
//! - [`mcplex_client`]: roots, inbound sampling/elicitation handling, and
//!   client-side handshake/routing.
//!
//! `prelude` re-exports the types most callers reach for first.

pub use mcplex_client as client;
pub use mcplex_protocol as protocol;
pub use mcplex_server as server;
pub use mcplex_session as session;
pub use mcplex_transport as transport;
pub use mcplex_types as types;

pub mod prelude {
    pub use mcplex_client::{Client, ClientBuilder, ClientConfig, ServerCall};
    pub use mcplex_protocol::{Envelope, ErrorCode, RpcError};
    pub use mcplex_server::{Server, ServerConfig, ServerPeer};
    pub use mcplex_session::{Kernel, KernelHandle, SessionState};
    pub use mcplex_transport::{Connection, Transport};
    pub use mcplex_types::{CallToolResult, ContentBlock, Prompt, Resource, ResourceTemplate, Tool};
}
