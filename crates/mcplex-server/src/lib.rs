//! Server-side state for mcplex: tool/resource/prompt registries,
//! resource subscriptions, the onion middleware chain around tool calls,
//! and the handshake/routing layer built on `mcplex-session::Kernel`
//! (spec §4.4.1).

pub mod config;
pub mod error;
pub mod middleware;
pub mod registry;
pub mod server;
pub mod templates;

pub use config::{RateLimitConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use middleware::{
    AllowAll, AuthMiddleware, AuthProvider, LoggingMiddleware, Metrics, MetricsMiddleware,
    Middleware, MiddlewareContext, RateLimitMiddleware, RecoveryMiddleware, RetryMiddleware,
    TimeoutMiddleware, ValidationMiddleware,
};
pub use registry::{PromptHandler, PromptRegistry, ResourceHandler, ResourceRegistry, TemplatedResourceHandler, ToolHandler, ToolRegistry};
pub use server::{Server, ServerPeer};
pub use templates::{SegmentTemplateResolver, TemplateResolver};
