//! JSON-RPC 2.0 envelope, error codes, and protocol-version/capability
//! negotiation — the wire-level half of the mcplex session kernel.
//!
//! This crate is deliberately inert: it has no event loop, no I/O, and no
//! async. `mcplex-transport` frames bytes into/out of [`envelope::Envelope`]
//! values; `mcplex-session` drives the state machine and correlation on
//! top of them.

pub mod envelope;
pub mod error;
pub mod methods;
pub mod version;

pub use envelope::{Envelope, FrameKind, Notification, Request, RequestId, Response, ResponsePayload, Version, JSONRPC_VERSION};
pub use error::{Error, ErrorCode, Result, RpcError};
pub use version::{negotiate, LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS};
