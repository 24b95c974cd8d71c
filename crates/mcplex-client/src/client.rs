//! The client-side protocol layer built on `mcplex-session::Kernel`:
//! answers server-initiated requests, routes server-initiated
//! notifications to a [`NotificationSink`], and offers typed wrappers for
//! every server-bound call (spec §4.4.2).

use std::sync::Arc;

use async_trait::async_trait;
use mcplex_protocol::methods::{client_bound, client_method_permitted, server_bound};
use mcplex_protocol::{negotiate, ErrorCode, RpcError};
use mcplex_session::kernel::{KernelHandle, NotificationHandler, RequestHandler, SessionState};
use mcplex_types::{CallToolResult, ClientCapabilities, Implementation, Prompt, PromptMessage, Resource, ResourceTemplate, ServerCapabilities, Tool};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::handlers::{ElicitationHandler, NotificationSink, NoopNotificationSink, RootsProvider, SamplingHandler, StaticRoots};

pub struct Client {
    config: ClientConfig,
    capabilities: ClientCapabilities,
    peer_capabilities: RwLock<Option<ServerCapabilities>>,
    roots: Arc<dyn RootsProvider>,
    sampling: Option<Arc<dyn SamplingHandler>>,
    elicitation: Option<Arc<dyn ElicitationHandler>>,
    sink: Arc<dyn NotificationSink>,
}

pub struct ClientBuilder {
    config: ClientConfig,
    roots: Arc<dyn RootsProvider>,
    sampling: Option<Arc<dyn SamplingHandler>>,
    elicitation: Option<Arc<dyn ElicitationHandler>>,
    sink: Arc<dyn NotificationSink>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            roots: Arc::new(StaticRoots::default()),
            sampling: None,
            elicitation: None,
            sink: Arc::new(NoopNotificationSink),
        }
    }

    pub fn with_roots(mut self, roots: Arc<dyn RootsProvider>) -> Self {
        self.roots = roots;
        self
    }

    pub fn with_sampling(mut self, handler: Arc<dyn SamplingHandler>) -> Self {
        self.sampling = Some(handler);
        self
    }

    pub fn with_elicitation(mut self, handler: Arc<dyn ElicitationHandler>) -> Self {
        self.elicitation = Some(handler);
        self
    }

    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> Client {
        let capabilities = ClientCapabilities {
            sampling: self.sampling.as_ref().map(|_| json!({})),
            elicitation: self.elicitation.as_ref().map(|_| json!({})),
            roots: Some(mcplex_types::ListChangedCapability { list_changed: false }),
        };
        Client {
            config: self.config,
            capabilities,
            peer_capabilities: RwLock::new(None),
            roots: self.roots,
            sampling: self.sampling,
            elicitation: self.elicitation,
            sink: self.sink,
        }
    }
}

impl Client {
    async fn handle_sampling(&self, params: Option<Value>) -> ClientResult<Value> {
        let handler = self.sampling.as_ref().ok_or(ClientError::NoSamplingHandler)?;
        let request = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| ClientError::Malformed(e.to_string()))?;
        let result = handler.create_message(request).await?;
        serde_json::to_value(result).map_err(|e| ClientError::Malformed(e.to_string()))
    }

    async fn handle_elicitation(&self, params: Option<Value>) -> ClientResult<Value> {
        let handler = self.elicitation.as_ref().ok_or(ClientError::NoElicitationHandler)?;
        let request = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| ClientError::Malformed(e.to_string()))?;
        let result = handler.elicit(request).await?;
        serde_json::to_value(result).map_err(|e| ClientError::Malformed(e.to_string()))
    }

    fn handle_roots_list(&self) -> Value {
        json!({ "roots": self.roots.list() })
    }
}

#[async_trait]
impl RequestHandler for Client {
    async fn handle(
        &self,
        _handle: &KernelHandle,
        method: &str,
        params: Option<Value>,
        _cancel: CancellationToken,
    ) -> Result<Value, RpcError> {
        if !client_method_permitted(method, &self.capabilities) {
            return Err(RpcError::capability_not_supported(method));
        }

        let result = match method {
            client_bound::SAMPLING_CREATE_MESSAGE => self.handle_sampling(params).await,
            client_bound::ELICITATION_CREATE => self.handle_elicitation(params).await,
            client_bound::ROOTS_LIST => Ok(self.handle_roots_list()),
            client_bound::PING => Ok(json!({})),
            other => Err(ClientError::Rpc(RpcError::method_not_found(other))),
        };

        result.map_err(RpcError::from)
    }
}

#[async_trait]
impl NotificationHandler for Client {
    async fn handle(&self, _handle: &KernelHandle, method: &str, params: Option<Value>) {
        match method {
            client_bound::TOOLS_LIST_CHANGED => self.sink.tools_list_changed().await,
            client_bound::RESOURCES_LIST_CHANGED => self.sink.resources_list_changed().await,
            client_bound::PROMPTS_LIST_CHANGED => self.sink.prompts_list_changed().await,
            client_bound::RESOURCES_UPDATED => {
                if let Some(uri) = params.as_ref().and_then(|p| p.get("uri")).and_then(Value::as_str) {
                    self.sink.resource_updated(uri).await;
                }
            }
            client_bound::LOGGING_MESSAGE => {
                if let Some(params) = &params {
                    let level = params.get("level").and_then(Value::as_str).unwrap_or("info");
                    let data = params.get("data").cloned().unwrap_or(Value::Null);
                    self.sink.log_message(level, &data).await;
                }
            }
            client_bound::PROGRESS => {
                if let Some(params) = &params {
                    let token = params.get("progressToken").cloned().unwrap_or(Value::Null);
                    let progress = params.get("progress").and_then(Value::as_f64).unwrap_or(0.0);
                    let total = params.get("total").and_then(Value::as_f64);
                    self.sink.progress(&token, progress, total).await;
                }
            }
            other => debug!(method = other, "unhandled server-bound notification"),
        }
    }
}

/// Typed wrappers for server-bound calls, mirroring `mcplex_server::ServerPeer`
/// on the other side of the connection.
pub struct ServerCall<'a> {
    handle: &'a KernelHandle,
}

impl<'a> ServerCall<'a> {
    pub fn new(handle: &'a KernelHandle) -> Self {
        Self { handle }
    }

    pub async fn initialize(&self, client: &Client) -> ClientResult<ServerCapabilities> {
        let params = json!({
            "protocolVersion": mcplex_protocol::LATEST_PROTOCOL_VERSION,
            "capabilities": client.capabilities,
            "clientInfo": Implementation {
                name: client.config.implementation_name.clone(),
                version: client.config.implementation_version.clone(),
            },
        });
        let value = self
            .handle
            .send_request(server_bound::INITIALIZE, Some(params), CancellationToken::new())
            .await?;
        let negotiated = value
            .get("protocolVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Malformed("missing protocolVersion in initialize result".into()))?;
        negotiate(negotiated).map_err(|e| ClientError::Rpc(e.into()))?;
        let peer_caps: ServerCapabilities = value
            .get("capabilities")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e: serde_json::Error| ClientError::Malformed(e.to_string()))?
            .unwrap_or_default();
        *client.peer_capabilities.write() = Some(peer_caps.clone());
        self.handle.transition(SessionState::Handshaking);
        self.handle.send_notification(server_bound::INITIALIZED, None).await?;
        self.handle.transition(SessionState::Operational);
        Ok(peer_caps)
    }

    pub async fn list_tools(&self) -> ClientResult<Vec<Tool>> {
        let value = self.handle.send_request(server_bound::TOOLS_LIST, None, CancellationToken::new()).await?;
        extract(value, "tools")
    }

    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> ClientResult<CallToolResult> {
        let params = json!({ "name": name, "arguments": arguments });
        let value = self
            .handle
            .send_request(server_bound::TOOLS_CALL, Some(params), CancellationToken::new())
            .await?;
        serde_json::from_value(value).map_err(|e| ClientError::Malformed(e.to_string()))
    }

    pub async fn list_resources(&self) -> ClientResult<Vec<Resource>> {
        let value = self.handle.send_request(server_bound::RESOURCES_LIST, None, CancellationToken::new()).await?;
        extract(value, "resources")
    }

    pub async fn list_resource_templates(&self) -> ClientResult<Vec<ResourceTemplate>> {
        let value = self
            .handle
            .send_request(server_bound::RESOURCE_TEMPLATES_LIST, None, CancellationToken::new())
            .await?;
        extract(value, "resourceTemplates")
    }

    pub async fn read_resource(&self, uri: &str) -> ClientResult<Vec<mcplex_types::EmbeddedResource>> {
        let params = json!({ "uri": uri });
        let value = self
            .handle
            .send_request(server_bound::RESOURCES_READ, Some(params), CancellationToken::new())
            .await?;
        extract(value, "contents")
    }

    pub async fn subscribe_resource(&self, uri: &str) -> ClientResult<()> {
        let params = json!({ "uri": uri });
        self.handle
            .send_request(server_bound::RESOURCES_SUBSCRIBE, Some(params), CancellationToken::new())
            .await?;
        Ok(())
    }

    pub async fn unsubscribe_resource(&self, uri: &str) -> ClientResult<()> {
        let params = json!({ "uri": uri });
        self.handle
            .send_request(server_bound::RESOURCES_UNSUBSCRIBE, Some(params), CancellationToken::new())
            .await?;
        Ok(())
    }

    pub async fn list_prompts(&self) -> ClientResult<Vec<Prompt>> {
        let value = self.handle.send_request(server_bound::PROMPTS_LIST, None, CancellationToken::new()).await?;
        extract(value, "prompts")
    }

    pub async fn get_prompt(&self, name: &str, arguments: Option<Value>) -> ClientResult<Vec<PromptMessage>> {
        let params = json!({ "name": name, "arguments": arguments });
        let value = self
            .handle
            .send_request(server_bound::PROMPTS_GET, Some(params), CancellationToken::new())
            .await?;
        extract(value, "messages")
    }

    pub async fn ping(&self) -> ClientResult<()> {
        self.handle.send_request(server_bound::PING, None, CancellationToken::new()).await?;
        Ok(())
    }
}

fn extract<T: serde::de::DeserializeOwned>(value: Value, field: &str) -> ClientResult<T> {
    let field_value = value
        .get(field)
        .cloned()
        .ok_or_else(|| ClientError::Malformed(format!("missing \"{field}\" field")))?;
    serde_json::from_value(field_value).map_err(|e| ClientError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_capabilities_from_registered_handlers() {
        struct NoopSampling;
        #[async_trait]
        impl SamplingHandler for NoopSampling {
            async fn create_message(&self, _request: mcplex_types::CreateMessageRequest) -> ClientResult<mcplex_types::CreateMessageResult> {
                unimplemented!()
            }
        }

        let client = ClientBuilder::new(ClientConfig::default())
            .with_sampling(Arc::new(NoopSampling))
            .build();
        assert!(client.capabilities.sampling.is_some());
        assert!(client.capabilities.elicitation.is_none());
    }
}
