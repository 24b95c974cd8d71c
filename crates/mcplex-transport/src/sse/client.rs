//! Client side of the SSE/HTTP hybrid transport (spec §4.2.2, §6).
//!
//! `GET <base>` opens the event stream and yields an `event: endpoint`
//! frame carrying the per-session POST URL; every outbound frame is then
//! POSTed there, and the real JSON-RPC response arrives later as
//! `event: message` on the still-open GET stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use mcplex_protocol::{Envelope, LATEST_PROTOCOL_VERSION};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use url::Url;

use crate::codec::{decode_frame, encode_frame};
use crate::error::{TransportError, TransportResult};
use crate::sse::event_parser::SseStreamParser;
use crate::traits::{Connection, Transport};

pub const MCP_SESSION_ID_HEADER: &str = "MCP-Session-Id";
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// How long [`SseClientTransport::connect`] waits for a same-origin
/// `event: endpoint` frame before giving up (spec §8 scenario 6).
const ENDPOINT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SseClientTransport {
    base_url: Url,
    http: reqwest::Client,
}

impl SseClientTransport {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url.as_ref())?,
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Transport for SseClientTransport {
    async fn connect(&self) -> TransportResult<Box<dyn Connection>> {
        let response = self
            .http
            .get(self.base_url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(MCP_PROTOCOL_VERSION_HEADER, LATEST_PROTOCOL_VERSION)
            .send()
            .await
            .map_err(|e| TransportError::Other(e.into()))?;

        let session_id = response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut byte_stream = response.bytes_stream();
        let mut parser = SseStreamParser::new();
        let base_host = self.base_url.host_str().map(str::to_string);

        let endpoint_url = tokio::time::timeout(ENDPOINT_DISCOVERY_TIMEOUT, async {
            loop {
                let chunk = byte_stream
                    .next()
                    .await
                    .ok_or(TransportError::ConnectionClosed)?
                    .map_err(|e| TransportError::Other(e.into()))?;
                for event in parser.push(&chunk) {
                    if event.event != "endpoint" {
                        continue;
                    }
                    match Url::parse(&event.data) {
                        Ok(url) if url.host_str().map(str::to_string) == base_host => {
                            return Ok::<_, TransportError>(url);
                        }
                        Ok(url) => {
                            warn!(endpoint = %url, base_host = ?base_host, "dropping cross-origin SSE endpoint event");
                        }
                        Err(err) => {
                            warn!(error = %err, "dropping unparseable SSE endpoint event");
                        }
                    }
                }
            }
        })
        .await
        .map_err(|_| TransportError::Timeout)??;

        let (tx, rx) = mpsc::channel(256);
        let closed = Arc::new(AtomicBool::new(false));
        let task_closed = closed.clone();

        let reader_task = tokio::spawn(async move {
            loop {
                let chunk = match byte_stream.next().await {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(err)) => {
                        let _ = tx.send(Err(TransportError::Other(err.into()))).await;
                        break;
                    }
                    None => break,
                };
                for event in parser.push(&chunk) {
                    if event.event != "message" {
                        continue;
                    }
                    let decoded = decode_frame(event.data.as_bytes(), None);
                    if tx.send(decoded).await.is_err() {
                        break;
                    }
                }
            }
            task_closed.store(true, Ordering::Release);
        });

        Ok(Box::new(SseClientConnection {
            http: self.http.clone(),
            endpoint_url,
            session_id,
            inbound: Mutex::new(rx),
            closed,
            reader_task: Mutex::new(Some(reader_task)),
        }))
    }
}

pub struct SseClientConnection {
    http: reqwest::Client,
    endpoint_url: Url,
    session_id: Option<String>,
    inbound: Mutex<mpsc::Receiver<TransportResult<Envelope>>>,
    closed: Arc<AtomicBool>,
    reader_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

#[async_trait]
impl Connection for SseClientConnection {
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
        let body = encode_frame(envelope)?;
        let mut request = self
            .http
            .post(self.endpoint_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(MCP_PROTOCOL_VERSION_HEADER, LATEST_PROTOCOL_VERSION)
            .body(body);
        if let Some(session_id) = &self.session_id {
            request = request.header(MCP_SESSION_ID_HEADER, session_id.as_str());
        }
        let response = request.send().await.map_err(|e| TransportError::Other(e.into()))?;
        if response.status() == reqwest::StatusCode::ACCEPTED {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(%status, %body, "POST rejected by server");
        Err(TransportError::Malformed(format!("server rejected frame: {status} {body}")))
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Ok(());
        }
        if let Some(handle) = self.reader_task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }
}
