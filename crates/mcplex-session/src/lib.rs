//! The symmetric JSON-RPC session runtime shared by both sides of an
//! mcplex connection (spec §3 "Session", §4.3 "Correlator", §4.4 "Session
//! kernel", §4.5 "Keep-alive").
//!
//! Neither this crate nor [`Kernel`](kernel::Kernel) knows what MCP
//! methods mean — that's `mcplex-server`/`mcplex-client`'s job, layered
//! on top via [`kernel::RequestHandler`]/[`kernel::NotificationHandler`].
//! What lives here is transport-agnostic and protocol-agnostic: frame
//! classification and routing, request/response correlation, session
//! state, and keep-alive.

pub mod correlator;
pub mod error;
pub mod kernel;
pub mod keepalive;

pub use correlator::Correlator;
pub use error::{SessionError, SessionResult};
pub use kernel::{Kernel, KernelHandle, NotificationHandler, RequestHandler, SessionState};
pub use keepalive::KeepAlive;
