//! Tool/resource/prompt registries and resource-subscription index
//! (spec §4.4.1 "Server state").
//!
//! Grounded on the teacher's `turbomcp-server::handlers`/`registry`
//! (`ToolHandler`/`ResourceHandler`/`PromptHandler` traits backed by
//! `DashMap`), trimmed to what the spec actually names: no RBAC, no
//! elicitation/completion handler slots (those live client-side, since
//! the server only ever *calls out* for sampling/elicitation — see
//! `mcplex-client`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use mcplex_types::{CallToolResult, Prompt, PromptMessage, Resource, ResourceTemplate, Tool};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ServerResult;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// `cancel` fires when the peer sends `notifications/cancelled` for
    /// this call (spec §8 scenario 2); long-running handlers should race
    /// their work against it with `tokio::select!` and return promptly.
    async fn call(&self, arguments: Option<Value>, cancel: CancellationToken) -> ServerResult<CallToolResult>;
    fn definition(&self) -> Tool;
}

#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(&self, uri: &str) -> ServerResult<Vec<mcplex_types::EmbeddedResource>>;
    fn definition(&self) -> Resource;
}

#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn render(&self, arguments: HashMap<String, Value>) -> ServerResult<Vec<PromptMessage>>;
    fn definition(&self) -> Prompt;
}

/// A resource whose URI is only known at read time (spec §9's
/// resource-template gap): resolved through [`crate::templates::TemplateResolver`]
/// rather than looked up by exact URI.
#[async_trait]
pub trait TemplatedResourceHandler: Send + Sync {
    async fn read(&self, uri: &str, extracted: HashMap<String, String>) -> ServerResult<Vec<mcplex_types::EmbeddedResource>>;
    fn definition(&self) -> ResourceTemplate;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn register(&self, handler: Arc<dyn ToolHandler>) {
        self.tools.insert(handler.definition().name.clone(), handler);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<Tool> {
        self.tools.iter().map(|entry| entry.value().definition()).collect()
    }
}

#[derive(Default)]
pub struct ResourceRegistry {
    resources: DashMap<String, Arc<dyn ResourceHandler>>,
    templates: DashMap<String, Arc<dyn TemplatedResourceHandler>>,
    /// Subscriber count per URI (spec §4.4.1: "subscribe/unsubscribe
    /// reference-count the same URI; the last unsubscribe removes it").
    subscriber_counts: DashMap<String, usize>,
}

impl ResourceRegistry {
    pub fn register(&self, handler: Arc<dyn ResourceHandler>) {
        self.resources.insert(handler.definition().uri.clone(), handler);
    }

    pub fn register_template(&self, handler: Arc<dyn TemplatedResourceHandler>) {
        self.templates
            .insert(handler.definition().uri_template.clone(), handler);
    }

    pub fn get(&self, uri: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.resources.get(uri).map(|entry| entry.value().clone())
    }

    pub fn templates(&self) -> Vec<Arc<dyn TemplatedResourceHandler>> {
        self.templates.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn list(&self) -> Vec<Resource> {
        self.resources.iter().map(|entry| entry.value().definition()).collect()
    }

    pub fn list_templates(&self) -> Vec<ResourceTemplate> {
        self.templates.iter().map(|entry| entry.value().definition()).collect()
    }

    /// Returns the new subscriber count for `uri`.
    pub fn subscribe(&self, uri: &str) -> usize {
        let mut count = self.subscriber_counts.entry(uri.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Returns `true` if this was the last subscriber (the URI should now
    /// be treated as unsubscribed).
    pub fn unsubscribe(&self, uri: &str) -> bool {
        match self.subscriber_counts.get_mut(uri) {
            Some(mut count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                drop(self.subscriber_counts.remove(uri));
                true
            }
            None => true,
        }
    }

    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.subscriber_counts.contains_key(uri)
    }

    pub fn subscribed_uris(&self) -> Vec<String> {
        self.subscriber_counts.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[derive(Default)]
pub struct PromptRegistry {
    prompts: DashMap<String, Arc<dyn PromptHandler>>,
}

impl PromptRegistry {
    pub fn register(&self, handler: Arc<dyn PromptHandler>) {
        self.prompts.insert(handler.definition().name.clone(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PromptHandler>> {
        self.prompts.get(name).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<Prompt> {
        self.prompts.iter().map(|entry| entry.value().definition()).collect()
    }
}
