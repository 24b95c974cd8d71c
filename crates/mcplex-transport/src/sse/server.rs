//! Server side of the SSE/HTTP hybrid transport (spec §4.2.2, §6).
//!
//! `axum` owns the HTTP listener; this module owns the session registry
//! and the glue that turns "a GET arrived" into a [`Connection`] the
//! session kernel can drive, and "a POST arrived" into a frame delivered
//! to that connection's read side.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use dashmap::DashMap;
use futures::stream::{Stream, StreamExt};
use mcplex_protocol::{Envelope, Error as ProtocolError, RpcError};
use serde::Deserialize;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::decode_frame;
use crate::error::{TransportError, TransportResult};
use crate::sse::client::MCP_SESSION_ID_HEADER;
use crate::sse::session_id;
use crate::traits::{Connection, Transport};

/// Default idle eviction threshold for the SSE session registry (spec
/// §4.2.2 "a janitor evicts sessions idle longer than a configurable
/// threshold (default ten minutes)").
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

struct SessionEntry {
    outbound: mpsc::Sender<Envelope>,
    inbound: Mutex<Option<mpsc::Sender<TransportResult<Envelope>>>>,
    last_active: parking_lot::Mutex<Instant>,
}

/// Shared state behind the axum router: the live session table plus the
/// channel new GET connections are published on so `Transport::connect`
/// (== "accept the next session") can wait for them.
pub struct SseServerTransport {
    sessions: Arc<DashMap<String, Arc<SessionEntry>>>,
    base_url: String,
    idle_timeout: Duration,
    accept_tx: mpsc::Sender<Box<dyn Connection>>,
    accept_rx: Mutex<mpsc::Receiver<Box<dyn Connection>>>,
    janitor_cancel: CancellationToken,
}

impl SseServerTransport {
    pub fn new(base_url: impl Into<String>) -> Arc<Self> {
        Self::with_idle_timeout(base_url, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(base_url: impl Into<String>, idle_timeout: Duration) -> Arc<Self> {
        let (accept_tx, accept_rx) = mpsc::channel(64);
        let transport = Arc::new(Self {
            sessions: Arc::new(DashMap::new()),
            base_url: base_url.into(),
            idle_timeout,
            accept_tx,
            accept_rx: Mutex::new(accept_rx),
            janitor_cancel: CancellationToken::new(),
        });
        transport.clone().spawn_janitor();
        transport
    }

    fn spawn_janitor(self: Arc<Self>) {
        let cancel = self.janitor_cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => self.evict_idle_sessions(),
                }
            }
        });
    }

    fn evict_idle_sessions(&self) {
        let now = Instant::now();
        self.sessions.retain(|id, entry| {
            let idle = now.duration_since(*entry.last_active.lock());
            let keep = idle < self.idle_timeout;
            if !keep {
                info!(session_id = %id, idle_secs = idle.as_secs(), "evicting idle SSE session");
            }
            keep
        });
    }

    /// Stops the idle-eviction janitor; callers are expected to do this
    /// when shutting the HTTP server down (spec §5 "must be stoppable via
    /// a context handed in at construction").
    pub fn stop_janitor(&self) {
        self.janitor_cancel.cancel();
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(sse_handler).post(rpc_handler))
            .route("/rpc", axum::routing::post(rpc_handler))
            .with_state(self)
    }
}

#[async_trait]
impl Transport for SseServerTransport {
    /// "Connecting" on the server side means accepting the next inbound
    /// GET; the axum handler below does the registry bookkeeping and
    /// publishes the resulting [`Connection`] here.
    async fn connect(&self) -> TransportResult<Box<dyn Connection>> {
        self.accept_rx.lock().await.recv().await.ok_or(TransportError::ConnectionClosed)
    }
}

async fn sse_handler(
    State(state): State<Arc<SseServerTransport>>,
) -> impl IntoResponse {
    let id = session_id::generate();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Envelope>(256);
    let (inbound_tx, inbound_rx) = mpsc::channel(256);

    state.sessions.insert(
        id.clone(),
        Arc::new(SessionEntry {
            outbound: outbound_tx,
            inbound: Mutex::new(Some(inbound_tx)),
            last_active: parking_lot::Mutex::new(Instant::now()),
        }),
    );

    let connection: Box<dyn Connection> = Box::new(SseServerConnection {
        session_id: id.clone(),
        sessions: state.sessions.clone(),
        inbound: Mutex::new(inbound_rx),
        closed: Arc::new(AtomicBool::new(false)),
    });
    if state.accept_tx.send(connection).await.is_err() {
        warn!("no one is accepting SSE connections; dropping session");
    }

    let endpoint_url = format!("{}/rpc?sessionId={id}", state.base_url);
    let endpoint_event = futures::stream::once(async move {
        Ok::<_, std::convert::Infallible>(Event::default().event("endpoint").data(endpoint_url))
    });
    let message_events = tokio_stream::wrappers::ReceiverStream::new(outbound_rx).map(|envelope| {
        let data = serde_json::to_string(&envelope).unwrap_or_default();
        Ok::<_, std::convert::Infallible>(Event::default().event("message").data(data))
    });

    let stream: std::pin::Pin<Box<dyn Stream<Item = Result<Event, std::convert::Infallible>> + Send>> =
        Box::pin(endpoint_event.chain(message_events));

    let mut response = Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
    response
        .headers_mut()
        .insert(MCP_SESSION_ID_HEADER, id.parse().expect("hex session id is valid header value"));
    response
}

#[derive(Debug, Deserialize)]
struct RpcQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn rpc_handler(
    State(state): State<Arc<SseServerTransport>>,
    Query(query): Query<RpcQuery>,
    headers: axum::http::HeaderMap,
    body: bytes::Bytes,
) -> impl IntoResponse {
    let session_id = query
        .session_id
        .or_else(|| headers.get(MCP_SESSION_ID_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string));

    let Some(session_id) = session_id else {
        return bad_request(RpcError::invalid_params("missing sessionId"));
    };
    let Some(entry) = state.sessions.get(&session_id) else {
        return bad_request(RpcError::invalid_params(format!("unknown session: {session_id}")));
    };

    match decode_frame(&body, None) {
        Ok(envelope) => {
            *entry.last_active.lock() = Instant::now();
            let inbound = entry.inbound.lock().await;
            if let Some(sender) = inbound.as_ref() {
                let _ = sender.send(Ok(envelope)).await;
            }
            axum::http::StatusCode::ACCEPTED.into_response()
        }
        Err(TransportError::Malformed(detail)) => bad_request(RpcError::invalid_params(detail)),
        Err(TransportError::Protocol(ProtocolError::Serialization(e))) => {
            bad_request(RpcError::new(mcplex_protocol::ErrorCode::ParseError, e.to_string()))
        }
        Err(other) => bad_request(RpcError::invalid_params(other.to_string())),
    }
}

fn bad_request(error: RpcError) -> axum::response::Response {
    (axum::http::StatusCode::BAD_REQUEST, Json(serde_json::json!({"jsonrpc": "2.0", "id": null, "error": error}))).into_response()
}

pub struct SseServerConnection {
    session_id: String,
    sessions: Arc<DashMap<String, Arc<SessionEntry>>>,
    inbound: Mutex<mpsc::Receiver<TransportResult<Envelope>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Connection for SseServerConnection {
    async fn read(&self) -> TransportResult<Envelope> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        let mut inbound = self.inbound.lock().await;
        inbound.recv().await.ok_or(TransportError::ConnectionClosed)?
    }

    async fn write(&self, envelope: &Envelope) -> TransportResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        let Some(entry) = self.sessions.get(&self.session_id) else {
            return Err(TransportError::ConnectionClosed);
        };
        if entry.outbound.send(envelope.clone()).await.is_err() {
            debug!(session_id = %self.session_id, "dropping message: SSE stream overflowed or closed");
        }
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Ok(());
        }
        self.sessions.remove(&self.session_id);
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        Some(self.session_id.clone())
    }
}
