//! The server-side protocol layer: handshake/capability gating on top of
//! `mcplex-session::Kernel`, method routing to the registries, and
//! server-originated typed wrappers for calling back into the client
//! (spec §4.4.1).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mcplex_protocol::methods::{allowed_before_operational, server_bound, server_method_permitted};
use mcplex_protocol::{negotiate, ErrorCode, RpcError};
use mcplex_session::kernel::{KernelHandle, NotificationHandler, RequestHandler, SessionState};
use mcplex_types::{
    CallToolResult, ClientCapabilities, CreateMessageRequest, CreateMessageResult, ElicitRequest,
    ElicitResult, Implementation, ServerCapabilities,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::middleware::{dispatch, Middleware, MiddlewareContext};
use crate::registry::{PromptRegistry, ResourceRegistry, ToolRegistry};
use crate::templates::{resolve, SegmentTemplateResolver, TemplateResolver};

pub struct Server {
    config: ServerConfig,
    capabilities: ServerCapabilities,
    peer_capabilities: RwLock<Option<ClientCapabilities>>,
    tools: ToolRegistry,
    resources: ResourceRegistry,
    prompts: PromptRegistry,
    middleware: Vec<Arc<dyn Middleware>>,
    template_resolver: Box<dyn TemplateResolver>,
    /// The session's declared log level (spec §3, §4.4.1
    /// "logging/setLevel: update per-session log level"); defaults to
    /// "info" until the peer requests otherwise.
    log_level: RwLock<String>,
}

impl Server {
    pub fn new(config: ServerConfig, capabilities: ServerCapabilities, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            config,
            capabilities,
            peer_capabilities: RwLock::new(None),
            tools: ToolRegistry::default(),
            resources: ResourceRegistry::default(),
            prompts: PromptRegistry::default(),
            middleware,
            template_resolver: Box::new(SegmentTemplateResolver),
            log_level: RwLock::new("info".to_string()),
        }
    }

    /// The level most recently set via `logging/setLevel`, or "info" if
    /// the peer never called it.
    pub fn log_level(&self) -> String {
        self.log_level.read().clone()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn prompts(&self) -> &PromptRegistry {
        &self.prompts
    }

    fn peer_supports_resource_list_changed(&self) -> bool {
        self.capabilities.resources.is_some_and(|r| r.list_changed)
    }

    async fn handle_initialize(&self, params: Option<Value>) -> ServerResult<Value> {
        let params = params.unwrap_or(Value::Null);
        let requested_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidArguments("missing protocolVersion".into()))?;
        let negotiated = negotiate(requested_version).map_err(|e| ServerError::Rpc(e.into()))?;

        let peer_caps: ClientCapabilities = params
            .get("capabilities")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e: serde_json::Error| ServerError::InvalidArguments(e.to_string()))?
            .unwrap_or_default();
        *self.peer_capabilities.write() = Some(peer_caps);

        Ok(json!({
            "protocolVersion": negotiated,
            "capabilities": self.capabilities,
            "serverInfo": Implementation {
                name: self.config.implementation_name.clone(),
                version: self.config.implementation_version.clone(),
            },
        }))
    }

    async fn handle_tools_list(&self) -> ServerResult<Value> {
        Ok(json!({ "tools": self.tools.list() }))
    }

    async fn handle_tools_call(&self, params: Option<Value>, cancel: CancellationToken) -> ServerResult<Value> {
        let params = params.ok_or_else(|| ServerError::InvalidArguments("missing params".into()))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidArguments("missing tool name".into()))?;
        let arguments = params.get("arguments").cloned();

        // A missing tool, and any failure the middleware chain or the
        // handler itself produces, is a tool-level outcome (spec §4.4.1,
        // §7 category 2) — the request itself still succeeded at the
        // protocol level, so these become `isError` results, not RPC
        // errors.
        let Some(handler) = self.tools.get(name) else {
            let result = CallToolResult::error(format!("tool not found: {name}"));
            return serde_json::to_value(result).map_err(|e| ServerError::InvalidArguments(e.to_string()));
        };
        let ctx = MiddlewareContext {
            tool_name: name.to_string(),
            arguments,
            cancel,
        };
        let result = match dispatch(&self.middleware, handler.as_ref(), ctx).await {
            Ok(result) => result,
            Err(err) => CallToolResult::error(err.to_string()),
        };
        serde_json::to_value(result).map_err(|e| ServerError::InvalidArguments(e.to_string()))
    }

    async fn handle_resources_list(&self) -> ServerResult<Value> {
        Ok(json!({ "resources": self.resources.list() }))
    }

    async fn handle_resource_templates_list(&self) -> ServerResult<Value> {
        Ok(json!({ "resourceTemplates": self.resources.list_templates() }))
    }

    async fn handle_resources_read(&self, params: Option<Value>) -> ServerResult<Value> {
        let uri = params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidArguments("missing uri".into()))?;

        if let Some(handler) = self.resources.get(uri) {
            let contents = handler.read(uri).await?;
            return Ok(json!({ "contents": contents }));
        }

        let templates = self.resources.templates();
        let owned: Vec<String> = templates.iter().map(|t| t.definition().uri_template).collect();
        let borrowed: Vec<&str> = owned.iter().map(String::as_str).collect();
        if let Some((matched_template, extracted)) = resolve(self.template_resolver.as_ref(), borrowed.into_iter(), uri) {
            let index = owned.iter().position(|t| t == matched_template).expect("matched template must be in owned list");
            let contents = templates[index].read(uri, extracted).await?;
            return Ok(json!({ "contents": contents }));
        }

        Err(ServerError::ResourceNotFound(uri.to_string()))
    }

    async fn handle_resources_subscribe(&self, params: Option<Value>) -> ServerResult<Value> {
        let uri = params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidArguments("missing uri".into()))?;
        self.resources.subscribe(uri);
        Ok(json!({}))
    }

    async fn handle_resources_unsubscribe(&self, params: Option<Value>) -> ServerResult<Value> {
        let uri = params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidArguments("missing uri".into()))?;
        self.resources.unsubscribe(uri);
        Ok(json!({}))
    }

    async fn handle_prompts_list(&self) -> ServerResult<Value> {
        Ok(json!({ "prompts": self.prompts.list() }))
    }

    async fn handle_prompts_get(&self, params: Option<Value>) -> ServerResult<Value> {
        let params = params.ok_or_else(|| ServerError::InvalidArguments("missing params".into()))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidArguments("missing prompt name".into()))?;
        let arguments: HashMap<String, Value> = params
            .get("arguments")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e: serde_json::Error| ServerError::InvalidArguments(e.to_string()))?
            .unwrap_or_default();

        let handler = self.prompts.get(name).ok_or_else(|| ServerError::PromptNotFound(name.to_string()))?;
        let messages = handler.render(arguments).await?;
        Ok(json!({ "messages": messages }))
    }

    async fn handle_logging_set_level(&self, params: Option<Value>) -> ServerResult<Value> {
        let level = params
            .as_ref()
            .and_then(|p| p.get("level"))
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::InvalidArguments("missing level".into()))?;
        *self.log_level.write() = level.to_string();
        Ok(json!({}))
    }
}

#[async_trait]
impl RequestHandler for Server {
    async fn handle(
        &self,
        handle: &KernelHandle,
        method: &str,
        params: Option<Value>,
        cancel: CancellationToken,
    ) -> Result<Value, RpcError> {
        if handle.state() != SessionState::Operational && !allowed_before_operational(method) {
            return Err(RpcError::not_operational());
        }
        if !server_method_permitted(method, &self.capabilities) {
            return Err(RpcError::capability_not_supported(method));
        }

        let result = match method {
            server_bound::INITIALIZE => {
                let result = self.handle_initialize(params).await;
                if result.is_ok() {
                    handle.transition(SessionState::Handshaking);
                }
                result
            }
            server_bound::TOOLS_LIST => self.handle_tools_list().await,
            server_bound::TOOLS_CALL => self.handle_tools_call(params, cancel).await,
            server_bound::RESOURCES_LIST => self.handle_resources_list().await,
            server_bound::RESOURCE_TEMPLATES_LIST => self.handle_resource_templates_list().await,
            server_bound::RESOURCES_READ => self.handle_resources_read(params).await,
            server_bound::RESOURCES_SUBSCRIBE => self.handle_resources_subscribe(params).await,
            server_bound::RESOURCES_UNSUBSCRIBE => self.handle_resources_unsubscribe(params).await,
            server_bound::PROMPTS_LIST => self.handle_prompts_list().await,
            server_bound::PROMPTS_GET => self.handle_prompts_get(params).await,
            server_bound::PING => Ok(json!({})),
            server_bound::LOGGING_SET_LEVEL => self.handle_logging_set_level(params).await,
            server_bound::COMPLETION_COMPLETE => Ok(json!({ "completion": { "values": [], "total": 0, "hasMore": false } })),
            other => Err(ServerError::Rpc(RpcError::method_not_found(other))),
        };

        result.map_err(RpcError::from)
    }
}

const LOGGING_MESSAGE: &str = mcplex_protocol::methods::client_bound::LOGGING_MESSAGE;

#[async_trait]
impl NotificationHandler for Server {
    async fn handle(&self, handle: &KernelHandle, method: &str, _params: Option<Value>) {
        if method == server_bound::INITIALIZED {
            handle.transition(SessionState::Operational);
        }
    }
}

/// Server-originated calls into the client (spec §4.4.1's "server calls
/// out" row): sampling, elicitation, roots listing, logging, progress,
/// and list-changed fan-out. These all go through the same kernel
/// correlator as any other outbound request/notification.
pub struct ServerPeer<'a> {
    handle: &'a KernelHandle,
}

impl<'a> ServerPeer<'a> {
    pub fn new(handle: &'a KernelHandle) -> Self {
        Self { handle }
    }

    pub async fn create_message(&self, request: CreateMessageRequest) -> ServerResult<CreateMessageResult> {
        let params = serde_json::to_value(request).map_err(|e| ServerError::InvalidArguments(e.to_string()))?;
        let value = self
            .handle
            .send_request(
                mcplex_protocol::methods::client_bound::SAMPLING_CREATE_MESSAGE,
                Some(params),
                CancellationToken::new(),
            )
            .await?;
        serde_json::from_value(value).map_err(|e| ServerError::InvalidArguments(e.to_string()))
    }

    pub async fn elicit(&self, request: ElicitRequest) -> ServerResult<ElicitResult> {
        let params = serde_json::to_value(request).map_err(|e| ServerError::InvalidArguments(e.to_string()))?;
        let value = self
            .handle
            .send_request(
                mcplex_protocol::methods::client_bound::ELICITATION_CREATE,
                Some(params),
                CancellationToken::new(),
            )
            .await?;
        serde_json::from_value(value).map_err(|e| ServerError::InvalidArguments(e.to_string()))
    }

    pub async fn list_roots(&self) -> ServerResult<Vec<mcplex_types::Root>> {
        let value = self
            .handle
            .send_request(mcplex_protocol::methods::client_bound::ROOTS_LIST, None, CancellationToken::new())
            .await?;
        let roots = value
            .get("roots")
            .cloned()
            .ok_or_else(|| ServerError::InvalidArguments("missing roots field".into()))?;
        serde_json::from_value(roots).map_err(|e| ServerError::InvalidArguments(e.to_string()))
    }

    pub async fn ping(&self) -> ServerResult<()> {
        self.handle
            .send_request(mcplex_protocol::methods::client_bound::PING, None, CancellationToken::new())
            .await?;
        Ok(())
    }

    pub async fn log(&self, level: &str, data: Value) -> ServerResult<()> {
        self.handle
            .send_notification(LOGGING_MESSAGE, Some(json!({ "level": level, "data": data })))
            .await
            .map_err(ServerError::Session)
    }

    pub async fn notify_progress(&self, progress_token: Value, progress: f64, total: Option<f64>) -> ServerResult<()> {
        self.handle
            .send_notification(
                mcplex_protocol::methods::client_bound::PROGRESS,
                Some(json!({ "progressToken": progress_token, "progress": progress, "total": total })),
            )
            .await
            .map_err(ServerError::Session)
    }

    pub async fn tools_list_changed(&self) -> ServerResult<()> {
        self.handle
            .send_notification(mcplex_protocol::methods::client_bound::TOOLS_LIST_CHANGED, None)
            .await
            .map_err(ServerError::Session)
    }

    pub async fn prompts_list_changed(&self) -> ServerResult<()> {
        self.handle
            .send_notification(mcplex_protocol::methods::client_bound::PROMPTS_LIST_CHANGED, None)
            .await
            .map_err(ServerError::Session)
    }

    pub async fn resources_list_changed(&self) -> ServerResult<()> {
        self.handle
            .send_notification(mcplex_protocol::methods::client_bound::RESOURCES_LIST_CHANGED, None)
            .await
            .map_err(ServerError::Session)
    }

    /// Notifies the peer that `uri` changed, but only if it is currently
    /// subscribed (spec §4.4.1: unsubscribed updates are not sent).
    pub async fn resource_updated(&self, resources: &ResourceRegistry, uri: &str) -> ServerResult<()> {
        if !resources.is_subscribed(uri) {
            return Ok(());
        }
        self.handle
            .send_notification(
                mcplex_protocol::methods::client_bound::RESOURCES_UPDATED,
                Some(json!({ "uri": uri })),
            )
            .await
            .map_err(ServerError::Session)
    }
}
