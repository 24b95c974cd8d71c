//! Shared domain types for the mcplex SDK.
//!
//! This crate holds the wire-serializable nouns of the Model Context
//! Protocol — content blocks, tool/resource/prompt registrations, roots,
//! capability trees, and sampling/elicitation payloads. It knows nothing
//! about JSON-RPC envelopes (that's `mcplex-protocol`), transports, or
//! async handlers (that's `mcplex-server`/`mcplex-client`).

pub mod capabilities;
pub mod content;
pub mod registrations;
pub mod sampling;

pub use capabilities::{ClientCapabilities, Implementation, ListChangedCapability, ResourcesCapability, ServerCapabilities};
pub use content::{CallToolResult, ContentBlock, EmbeddedResource, ImageContent, ResourceLink, TextContent};
pub use registrations::{Prompt, PromptArgument, PromptMessage, Resource, ResourceTemplate, Role, Root, Schema, Tool};
pub use sampling::{CreateMessageRequest, CreateMessageResult, ElicitAction, ElicitRequest, ElicitResult, SamplingMessage};
