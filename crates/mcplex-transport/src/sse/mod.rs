//! SSE/HTTP hybrid transport (spec §4.2.2).
//!
//! Per spec §9's "two overlapping SSE designs" note, this module is the
//! single coherent implementation: `client` opens the GET stream and
//! POSTs outbound frames; `server` answers both sides of that exchange
//! and owns the session registry + idle janitor.

mod client;
mod event_parser;
mod server;
mod session_id;

pub use client::{SseClientTransport, MCP_PROTOCOL_VERSION_HEADER, MCP_SESSION_ID_HEADER};
pub use server::{SseServerTransport, DEFAULT_IDLE_TIMEOUT};
