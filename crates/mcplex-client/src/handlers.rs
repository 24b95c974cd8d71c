//! Traits a client embedder implements to answer server-initiated calls
//! (spec §4.4.2 "Client state"): sampling, elicitation, and the set of
//! roots the server may enumerate.

use async_trait::async_trait;
use mcplex_types::{CreateMessageRequest, CreateMessageResult, ElicitRequest, ElicitResult, Root};
use serde_json::Value;

use crate::error::ClientResult;

#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(&self, request: CreateMessageRequest) -> ClientResult<CreateMessageResult>;
}

#[async_trait]
pub trait ElicitationHandler: Send + Sync {
    async fn elicit(&self, request: ElicitRequest) -> ClientResult<ElicitResult>;
}

pub trait RootsProvider: Send + Sync {
    fn list(&self) -> Vec<Root>;
}

#[derive(Default)]
pub struct StaticRoots(pub Vec<Root>);

impl RootsProvider for StaticRoots {
    fn list(&self) -> Vec<Root> {
        self.0.clone()
    }
}

/// Receives the server-bound notifications a client has no required
/// response for (spec §4.4.2's notification row): list-changed fan-out,
/// resource updates, log messages, and progress. The default
/// implementation just logs at debug level; embedders override what they
/// care about.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn tools_list_changed(&self) {}
    async fn resources_list_changed(&self) {}
    async fn resource_updated(&self, _uri: &str) {}
    async fn prompts_list_changed(&self) {}
    async fn log_message(&self, _level: &str, _data: &Value) {}
    async fn progress(&self, _progress_token: &Value, _progress: f64, _total: Option<f64>) {}
}

#[derive(Default)]
pub struct NoopNotificationSink;

#[async_trait]
impl NotificationSink for NoopNotificationSink {}
