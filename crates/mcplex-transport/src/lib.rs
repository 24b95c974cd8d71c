//! Transport abstraction and concrete realizations for mcplex (spec §4.2).
//!
//! [`traits::Transport`]/[`traits::Connection`] is the contract the
//! session kernel (`mcplex-session`) drives. Two non-trivial realizations
//! ship here: [`stdio::StdioTransport`] (line-delimited, point-to-point)
//! and the [`sse`] module's client/server pair (asymmetric duplex over
//! HTTP with endpoint discovery).

pub mod codec;
pub mod error;
#[cfg(feature = "sse")]
pub mod sse;
#[cfg(feature = "stdio")]
pub mod stdio;
pub mod traits;

pub use error::{TransportError, TransportResult};
pub use traits::{Connection, Transport};
