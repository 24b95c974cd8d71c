//! Client-side state for mcplex: roots, inbound sampling/elicitation
//! handling, and typed wrappers for server-bound calls, built on
//! `mcplex-session::Kernel` (spec §4.4.2).

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;

pub use client::{Client, ClientBuilder, ServerCall};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use handlers::{ElicitationHandler, NoopNotificationSink, NotificationSink, RootsProvider, SamplingHandler, StaticRoots};
