//! Per-direction request/response correlation (spec §4.3).
//!
//! One [`Correlator`] lives per session and is used by both directions —
//! the kernel is symmetric, so whichever side issues an outbound request
//! (client calling a tool, or server calling back for sampling) goes
//! through the same table.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use mcplex_protocol::envelope::{Notification, Request, Version};
use mcplex_protocol::{Envelope, RequestId, RpcError};
use mcplex_transport::Connection;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{SessionError, SessionResult};

type Waiter = oneshot::Sender<Result<Value, RpcError>>;

pub struct Correlator {
    next_id: AtomicI64,
    pending: DashMap<RequestId, Waiter>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            pending: DashMap::new(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn next_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Delivers an inbound response to the waiter registered for its id.
    /// Returns `true` if a waiter was found; an unmatched response (a
    /// duplicate, or one arriving after local cancellation) is logged and
    /// dropped, never an error.
    pub fn resolve(&self, id: &RequestId, result: Result<Value, RpcError>) -> bool {
        match self.pending.remove(id) {
            Some((_, sender)) => {
                let _ = sender.send(result);
                true
            }
            None => {
                debug!(request_id = %id, "response for unknown or already-resolved request id");
                false
            }
        }
    }

    /// Sends `method` as an outbound request over `connection`, waits for
    /// the matching response or `cancel`, and — on cancellation — removes
    /// the waiter and best-effort notifies the peer with
    /// `notifications/cancelled` (spec §4.3, §5 "Cancellation" source i).
    pub async fn send_request(
        &self,
        connection: &dyn Connection,
        method: &str,
        params: Option<Value>,
        cancel: CancellationToken,
    ) -> SessionResult<Value> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        let request = Envelope::Request(Request {
            jsonrpc: Version,
            method: method.to_string(),
            params,
            id: id.clone(),
        });
        if let Err(err) = connection.write(&request).await {
            self.pending.remove(&id);
            return Err(SessionError::Transport(err));
        }

        tokio::select! {
            result = rx => match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(rpc_error)) => Err(SessionError::Rpc(rpc_error)),
                Err(_) => Err(SessionError::ConnectionClosed),
            },
            _ = cancel.cancelled() => {
                self.pending.remove(&id);
                let cancel_notice = Envelope::Notification(Notification {
                    jsonrpc: Version,
                    method: "notifications/cancelled".to_string(),
                    params: Some(serde_json::json!({ "requestId": id })),
                });
                if let Err(err) = connection.write(&cancel_notice).await {
                    debug!(error = %err, "best-effort cancellation notice failed to send");
                }
                Err(SessionError::Cancelled)
            }
        }
    }

    /// Drains every pending waiter with the same terminal error — used on
    /// session close, where no individual request is being cancelled but
    /// none of them will ever get a real answer (spec §8 invariant: "No
    /// waiter is ever left pending after session Close returns").
    pub fn drain_all_closed(&self) {
        let ids: Vec<RequestId> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            if let Some((_, sender)) = self.pending.remove(&id) {
                let _ = sender.send(Err(RpcError::new(
                    mcplex_protocol::ErrorCode::InternalError,
                    "connection closed",
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcplex_transport::TransportResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingConnection {
        written: Mutex<Vec<Envelope>>,
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        async fn read(&self) -> TransportResult<Envelope> {
            std::future::pending().await
        }
        async fn write(&self, envelope: &Envelope) -> TransportResult<()> {
            self.written.lock().unwrap().push(envelope.clone());
            Ok(())
        }
        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn resolve_delivers_result_to_waiting_send_request() {
        let correlator = std::sync::Arc::new(Correlator::new());
        let cancel = CancellationToken::new();

        let c2 = correlator.clone();
        let handle = tokio::spawn(async move {
            c2.send_request(&RecordingConnection::default(), "ping", None, cancel).await
        });

        tokio::task::yield_now().await;
        let id = RequestId::Number(1);
        assert!(correlator.resolve(&id, Ok(serde_json::json!({}))));

        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn cancellation_removes_waiter_and_emits_cancelled_notice() {
        let correlator = Correlator::new();
        let conn = RecordingConnection::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = correlator.send_request(&conn, "slow_op", None, cancel).await;
        assert!(matches!(result, Err(SessionError::Cancelled)));
        assert_eq!(correlator.pending_count(), 0);

        let written = conn.written.lock().unwrap();
        assert_eq!(written.len(), 2); // the original request + the cancellation notice
        match &written[1] {
            Envelope::Notification(n) => assert_eq!(n.method, "notifications/cancelled"),
            other => panic!("expected a notification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn drain_all_closed_resolves_every_pending_waiter() {
        let correlator = std::sync::Arc::new(Correlator::new());
        let cancel = CancellationToken::new();

        let c2 = correlator.clone();
        let handle = tokio::spawn(async move { c2.send_request(&RecordingConnection::default(), "noop", None, cancel).await });
        tokio::task::yield_now().await;

        correlator.drain_all_closed();
        let result = handle.await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unmatched_response_is_dropped_not_errored() {
        let correlator = Correlator::new();
        assert!(!correlator.resolve(&RequestId::Number(999), Ok(serde_json::json!(null))));
    }
}
