//! The onion-composed middleware chain wrapped around every `tools/call`
//! dispatch (spec §4.4.1's middleware list: Recovery, Timeout, Logging,
//! Metrics, RateLimit, Auth, Retry, Validation).
//!
//! SPEC_FULL.md §4 chose a hand-rolled async trait chain over `tower` for
//! this core chain (axum/tower stay on the HTTP routing side of the SSE
//! server only) — the ordering contract here is small and fixed, and a
//! direct recursive `Next` costs less than adapting `tower::Service`'s
//! `poll_ready`/`call` split to an all-async call site.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use mcplex_types::{CallToolResult, Tool};
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::registry::ToolHandler;
use crate::ServerResult;

#[derive(Clone)]
pub struct MiddlewareContext {
    pub tool_name: String,
    pub arguments: Option<Value>,
    pub cancel: CancellationToken,
}

/// The remainder of the chain, including the terminal tool handler. Each
/// [`Middleware`] decides whether/how to call `next.run(...)`; skipping
/// the call short-circuits everything after it (used by rate-limit/auth
/// rejection).
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    handler: &'a dyn ToolHandler,
}

impl<'a> Next<'a> {
    pub async fn run(self, ctx: MiddlewareContext) -> ServerResult<CallToolResult> {
        match self.remaining.split_first() {
            Some((mw, rest)) => {
                mw.handle(
                    ctx,
                    Next {
                        remaining: rest,
                        handler: self.handler,
                    },
                )
                .await
            }
            None => self.handler.call(ctx.arguments, ctx.cancel).await,
        }
    }
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: MiddlewareContext, next: Next<'_>) -> ServerResult<CallToolResult>;
}

/// Runs `handler` through `chain` in order (index 0 is outermost).
pub async fn dispatch(
    chain: &[Arc<dyn Middleware>],
    handler: &dyn ToolHandler,
    ctx: MiddlewareContext,
) -> ServerResult<CallToolResult> {
    Next {
        remaining: chain,
        handler,
    }
    .run(ctx)
    .await
}

/// Catches a handler panic and converts it into an `isError` tool result
/// instead of letting it unwind past the middleware chain (spec §4.6).
pub struct RecoveryMiddleware;

#[async_trait]
impl Middleware for RecoveryMiddleware {
    async fn handle(&self, ctx: MiddlewareContext, next: Next<'_>) -> ServerResult<CallToolResult> {
        match AssertUnwindSafe(next.run(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(&panic);
                warn!(panic = %message, "tool handler panicked; converting to an error result");
                Ok(CallToolResult::error(format!("tool handler panicked: {message}")))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct TimeoutMiddleware {
    pub timeout: Duration,
}

#[async_trait]
impl Middleware for TimeoutMiddleware {
    async fn handle(&self, ctx: MiddlewareContext, next: Next<'_>) -> ServerResult<CallToolResult> {
        match tokio::time::timeout(self.timeout, next.run(ctx)).await {
            Ok(result) => result,
            Err(_) => Err(ServerError::Timeout),
        }
    }
}

pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(&self, ctx: MiddlewareContext, next: Next<'_>) -> ServerResult<CallToolResult> {
        let tool_name = ctx.tool_name.clone();
        let start = Instant::now();
        let result = next.run(ctx).await;
        let elapsed = start.elapsed();
        match &result {
            Ok(value) => info!(tool = %tool_name, ?elapsed, is_error = value.is_error, "tool call completed"),
            Err(err) => warn!(tool = %tool_name, ?elapsed, error = %err, "tool call failed"),
        }
        result
    }
}

#[derive(Default)]
pub struct Metrics {
    pub calls: AtomicU64,
    pub failures: AtomicU64,
}

pub struct MetricsMiddleware {
    pub metrics: Arc<Metrics>,
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    async fn handle(&self, ctx: MiddlewareContext, next: Next<'_>) -> ServerResult<CallToolResult> {
        self.metrics.calls.fetch_add(1, Ordering::Relaxed);
        let result = next.run(ctx).await;
        if result.is_err() {
            self.metrics.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

/// A fixed-window counter per tool name. Good enough for the spec's scope
/// (no distributed rate limiting, no token-bucket smoothing — see
/// SPEC_FULL.md non-goals on load balancing).
pub struct RateLimitMiddleware {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

impl RateLimitMiddleware {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn handle(&self, ctx: MiddlewareContext, next: Next<'_>) -> ServerResult<CallToolResult> {
        let allowed = {
            let mut windows = self.windows.lock();
            let entry = windows
                .entry(ctx.tool_name.clone())
                .or_insert((Instant::now(), 0));
            if entry.0.elapsed() >= self.window {
                *entry = (Instant::now(), 0);
            }
            if entry.1 < self.max_requests {
                entry.1 += 1;
                true
            } else {
                false
            }
        };

        if allowed {
            next.run(ctx).await
        } else {
            Err(ServerError::MiddlewareRejected(format!(
                "rate limit exceeded for tool \"{}\"",
                ctx.tool_name
            )))
        }
    }
}

pub trait AuthProvider: Send + Sync {
    fn authorize(&self, tool_name: &str) -> bool;
}

pub struct AllowAll;
impl AuthProvider for AllowAll {
    fn authorize(&self, _tool_name: &str) -> bool {
        true
    }
}

pub struct AuthMiddleware {
    pub provider: Arc<dyn AuthProvider>,
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(&self, ctx: MiddlewareContext, next: Next<'_>) -> ServerResult<CallToolResult> {
        if self.provider.authorize(&ctx.tool_name) {
            next.run(ctx).await
        } else {
            Err(ServerError::MiddlewareRejected(format!(
                "not authorized to call tool \"{}\"",
                ctx.tool_name
            )))
        }
    }
}

pub struct RetryMiddleware {
    pub max_attempts: u32,
}

#[async_trait]
impl Middleware for RetryMiddleware {
    async fn handle(&self, ctx: MiddlewareContext, next: Next<'_>) -> ServerResult<CallToolResult> {
        let attempts = self.max_attempts.max(1);
        let handler = next.handler;

        // The first attempt runs the rest of the chain (so everything
        // after Retry still applies once); `Next` borrows its remaining
        // slice and is consumed by `run`, so it can't be replayed — later
        // attempts call the handler directly instead of re-entering
        // whatever comes after Retry in the chain.
        let mut last_err = match next.run(ctx.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        for _ in 1..attempts {
            match handler.call(ctx.arguments.clone(), ctx.cancel.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }
}

pub struct ValidationMiddleware;

impl ValidationMiddleware {
    fn validate(tool: &Tool, arguments: &Option<Value>) -> ServerResult<()> {
        let required = tool
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if required.is_empty() {
            return Ok(());
        }
        let object = arguments
            .as_ref()
            .and_then(Value::as_object)
            .ok_or_else(|| ServerError::InvalidArguments("arguments must be a JSON object".into()))?;
        for key in required {
            if let Some(name) = key.as_str() {
                if !object.contains_key(name) {
                    return Err(ServerError::InvalidArguments(format!("missing required argument \"{name}\"")));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Middleware for ValidationMiddleware {
    async fn handle(&self, ctx: MiddlewareContext, next: Next<'_>) -> ServerResult<CallToolResult> {
        Self::validate(&next.handler.definition(), &ctx.arguments)?;
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_types::ContentBlock;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        async fn call(&self, arguments: Option<Value>, _cancel: CancellationToken) -> ServerResult<CallToolResult> {
            Ok(CallToolResult::success(vec![ContentBlock::text(
                arguments.map(|v| v.to_string()).unwrap_or_default(),
            )]))
        }

        fn definition(&self) -> Tool {
            Tool {
                name: "echo".into(),
                title: None,
                description: None,
                input_schema: serde_json::json!({"type": "object", "required": ["text"]}),
                output_schema: None,
                meta: None,
            }
        }
    }

    fn ctx(arguments: Option<Value>) -> MiddlewareContext {
        MiddlewareContext {
            tool_name: "echo".into(),
            arguments,
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn validation_rejects_missing_required_argument() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(ValidationMiddleware)];
        let result = dispatch(&chain, &EchoTool, ctx(Some(serde_json::json!({})))).await;
        assert!(matches!(result, Err(ServerError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn validation_passes_with_required_argument_present() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(ValidationMiddleware)];
        let result = dispatch(&chain, &EchoTool, ctx(Some(serde_json::json!({"text": "hi"})))).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn rate_limit_rejects_after_max_requests() {
        let chain: Vec<Arc<dyn Middleware>> =
            vec![Arc::new(RateLimitMiddleware::new(1, Duration::from_secs(60)))];
        let first = dispatch(&chain, &EchoTool, ctx(Some(serde_json::json!({"text": "a"})))).await;
        assert!(first.is_ok());
        let second = dispatch(&chain, &EchoTool, ctx(Some(serde_json::json!({"text": "b"})))).await;
        assert!(matches!(second, Err(ServerError::MiddlewareRejected(_))));
    }

    #[tokio::test]
    async fn timeout_middleware_fails_slow_handlers() {
        struct SlowTool;
        #[async_trait]
        impl ToolHandler for SlowTool {
            async fn call(&self, _arguments: Option<Value>, _cancel: CancellationToken) -> ServerResult<CallToolResult> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(CallToolResult::text("done"))
            }
            fn definition(&self) -> Tool {
                Tool {
                    name: "slow".into(),
                    title: None,
                    description: None,
                    input_schema: serde_json::json!({"type": "object"}),
                    output_schema: None,
                    meta: None,
                }
            }
        }

        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(TimeoutMiddleware { timeout: Duration::from_millis(5) })];
        let result = dispatch(&chain, &SlowTool, ctx(None)).await;
        assert!(matches!(result, Err(ServerError::Timeout)));
    }

    #[tokio::test]
    async fn recovery_middleware_converts_a_panic_into_an_error_result() {
        struct PanickingTool;
        #[async_trait]
        impl ToolHandler for PanickingTool {
            async fn call(&self, _arguments: Option<Value>, _cancel: CancellationToken) -> ServerResult<CallToolResult> {
                panic!("boom");
            }
            fn definition(&self) -> Tool {
                Tool {
                    name: "panics".into(),
                    title: None,
                    description: None,
                    input_schema: serde_json::json!({"type": "object"}),
                    output_schema: None,
                    meta: None,
                }
            }
        }

        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(RecoveryMiddleware)];
        let result = dispatch(&chain, &PanickingTool, ctx(None)).await.unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn full_chain_runs_in_declared_order() {
        let metrics = Arc::new(Metrics::default());
        let chain: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(RecoveryMiddleware),
            Arc::new(TimeoutMiddleware { timeout: Duration::from_secs(1) }),
            Arc::new(LoggingMiddleware),
            Arc::new(MetricsMiddleware { metrics: metrics.clone() }),
            Arc::new(AuthMiddleware { provider: Arc::new(AllowAll) }),
            Arc::new(ValidationMiddleware),
        ];
        let result = dispatch(&chain, &EchoTool, ctx(Some(serde_json::json!({"text": "hi"})))).await;
        assert!(result.is_ok());
        assert_eq!(metrics.calls.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.failures.load(Ordering::Relaxed), 0);
    }
}
