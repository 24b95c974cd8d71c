//! The symmetric session kernel (spec §4.4): one read loop per
//! connection, classifying frames and routing them to handler tasks. The
//! same [`Kernel`] type backs both the client side and the server side —
//! capability gating and the initialize handshake live one layer up, in
//! `mcplex-server`/`mcplex-client`, which drive `Kernel` through
//! [`RequestHandler`]/[`NotificationHandler`] implementations and
//! [`KernelHandle::transition`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use mcplex_protocol::envelope::Response;
use mcplex_protocol::{Envelope, RequestId, RpcError};
use mcplex_transport::Connection;
use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::correlator::Correlator;

/// Where the kernel's owning protocol layer thinks the session currently
/// is. The kernel itself only exposes the transition; it does not decide
/// when one is legal — that belongs to the initialize/handshake logic in
/// `mcplex-server`/`mcplex-client`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Handshaking,
    Operational,
    Closing,
    Closed,
}

/// Handles an inbound request and produces the result that becomes the
/// response's `result` (on `Ok`) or `error` (on `Err`).
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(
        &self,
        handle: &KernelHandle,
        method: &str,
        params: Option<Value>,
        cancel: CancellationToken,
    ) -> Result<Value, RpcError>;
}

/// Handles an inbound notification. Notifications have no response, so
/// there is nothing to return and no way to report an error back to the
/// peer; implementations log and move on.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, handle: &KernelHandle, method: &str, params: Option<Value>);
}

const CANCELLED_NOTIFICATION: &str = "notifications/cancelled";

/// A cheap, cloneable reference to a running [`Kernel`], handed to
/// handlers so they can issue their own outbound requests/notifications
/// (e.g. a tool call triggering `sampling/createMessage`) and inspect or
/// advance session state.
#[derive(Clone)]
pub struct KernelHandle {
    inner: Arc<Inner>,
}

struct Inner {
    connection: Arc<dyn Connection>,
    correlator: Correlator,
    incoming_cancels: DashMap<RequestId, CancellationToken>,
    state: SyncMutex<SessionState>,
    closed: AtomicBool,
    onclose_fired: AtomicBool,
}

impl KernelHandle {
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    pub fn transition(&self, new_state: SessionState) {
        *self.inner.state.lock() = new_state;
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.connection.session_id()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: CancellationToken,
    ) -> crate::error::SessionResult<Value> {
        self.inner
            .correlator
            .send_request(self.inner.connection.as_ref(), method, params, cancel)
            .await
    }

    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> crate::error::SessionResult<()> {
        let envelope = Envelope::Notification(mcplex_protocol::envelope::Notification {
            jsonrpc: mcplex_protocol::envelope::Version,
            method: method.to_string(),
            params,
        });
        self.inner
            .connection
            .write(&envelope)
            .await
            .map_err(crate::error::SessionError::Transport)
    }

    pub fn pending_outbound(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Closes the session. Idempotent: a second call is a no-op. Fires
    /// every pending incoming cancel, resolves every outbound waiter with
    /// a closed error, closes the underlying connection, then runs the
    /// `onclose` hook exactly once.
    pub async fn close(&self, onclose: &(dyn Fn() + Send + Sync)) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        *self.inner.state.lock() = SessionState::Closing;
        for entry in self.inner.incoming_cancels.iter() {
            entry.value().cancel();
        }
        self.inner.incoming_cancels.clear();
        self.inner.correlator.drain_all_closed();
        if let Err(err) = self.inner.connection.close().await {
            warn!(error = %err, "error closing underlying connection");
        }
        *self.inner.state.lock() = SessionState::Closed;
        if !self.inner.onclose_fired.swap(true, Ordering::AcqRel) {
            onclose();
        }
    }
}

/// Owns the read loop. `run` drives it to completion (peer disconnect,
/// local close, or an unrecoverable transport error); `wait` lets callers
/// block on that without holding a reference to the loop task itself.
pub struct Kernel {
    handle: KernelHandle,
    loop_task: SyncMutex<Option<JoinHandle<()>>>,
}

impl Kernel {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        let handle = KernelHandle {
            inner: Arc::new(Inner {
                connection,
                correlator: Correlator::new(),
                incoming_cancels: DashMap::new(),
                state: SyncMutex::new(SessionState::Created),
                closed: AtomicBool::new(false),
                onclose_fired: AtomicBool::new(false),
            }),
        };
        Self {
            handle,
            loop_task: SyncMutex::new(None),
        }
    }

    pub fn handle(&self) -> KernelHandle {
        self.handle.clone()
    }

    /// Spawns the read loop. Requests dispatch onto their own task so a
    /// slow handler never blocks the read of the next frame (spec §4.4:
    /// "concurrent requests are not serialized behind one another").
    pub fn spawn(
        &self,
        requests: Arc<dyn RequestHandler>,
        notifications: Arc<dyn NotificationHandler>,
    ) {
        let handle = self.handle.clone();
        let task = tokio::spawn(async move {
            read_loop(handle, requests, notifications).await;
        });
        *self.loop_task.lock() = Some(task);
    }

    pub async fn wait(&self) {
        let task = self.loop_task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                error!(error = %err, "session read loop task panicked");
            }
        }
    }
}

async fn read_loop(
    handle: KernelHandle,
    requests: Arc<dyn RequestHandler>,
    notifications: Arc<dyn NotificationHandler>,
) {
    loop {
        let envelope = match handle.inner.connection.read().await {
            Ok(envelope) => envelope,
            Err(mcplex_transport::TransportError::ConnectionClosed) => {
                debug!("connection closed, ending read loop");
                break;
            }
            Err(err) => {
                warn!(error = %err, "transport read error, ending read loop");
                break;
            }
        };

        match envelope {
            Envelope::Request(request) => {
                let cancel = CancellationToken::new();
                handle
                    .inner
                    .incoming_cancels
                    .insert(request.id.clone(), cancel.clone());
                let handle = handle.clone();
                let requests = requests.clone();
                tokio::spawn(async move {
                    let id = request.id.clone();
                    let result = requests
                        .handle(&handle, &request.method, request.params, cancel)
                        .await;
                    handle.inner.incoming_cancels.remove(&id);
                    let response = match result {
                        Ok(value) => Response::success(id, value),
                        Err(rpc_error) => Response::error(id, rpc_error),
                    };
                    if let Err(err) = handle.inner.connection.write(&Envelope::Response(response)).await {
                        warn!(error = %err, "failed to write response");
                    }
                });
            }
            Envelope::Response(response) => {
                let id = response.id.clone();
                handle.inner.correlator.resolve(&id, response.into_result());
            }
            Envelope::Notification(notification) if notification.method == CANCELLED_NOTIFICATION => {
                if let Some(id) = notification
                    .params
                    .as_ref()
                    .and_then(|p| p.get("requestId"))
                    .and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok())
                {
                    match handle.inner.incoming_cancels.remove(&id) {
                        Some((_, token)) => token.cancel(),
                        None => debug!(request_id = %id, "cancellation for unknown or already-finished request"),
                    }
                }
            }
            Envelope::Notification(notification) => {
                notifications
                    .handle(&handle, &notification.method, notification.params)
                    .await;
            }
        }
    }

    handle.close(&|| {}).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_transport::TransportResult;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex as AsyncMutex;

    struct DuplexConnection {
        inbound: AsyncMutex<tokio::sync::mpsc::Receiver<Envelope>>,
        outbound: tokio::sync::mpsc::Sender<Envelope>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl Connection for DuplexConnection {
        async fn read(&self) -> TransportResult<Envelope> {
            if self.closed.load(Ordering::Acquire) {
                return Err(mcplex_transport::TransportError::ConnectionClosed);
            }
            self.inbound
                .lock()
                .await
                .recv()
                .await
                .ok_or(mcplex_transport::TransportError::ConnectionClosed)
        }

        async fn write(&self, envelope: &Envelope) -> TransportResult<()> {
            self.outbound
                .send(envelope.clone())
                .await
                .map_err(|_| mcplex_transport::TransportError::ConnectionClosed)
        }

        async fn close(&self) -> TransportResult<()> {
            self.closed.store(true, Ordering::Release);
            Ok(())
        }
    }

    struct EchoRequests {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RequestHandler for EchoRequests {
        async fn handle(
            &self,
            _handle: &KernelHandle,
            method: &str,
            params: Option<Value>,
            _cancel: CancellationToken,
        ) -> Result<Value, RpcError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if method == "fail" {
                return Err(RpcError::method_not_found(method));
            }
            Ok(params.unwrap_or(Value::Null))
        }
    }

    struct NoopNotifications;

    #[async_trait]
    impl NotificationHandler for NoopNotifications {
        async fn handle(&self, _handle: &KernelHandle, _method: &str, _params: Option<Value>) {}
    }

    fn make_pair() -> (Arc<DuplexConnection>, tokio::sync::mpsc::Sender<Envelope>, tokio::sync::mpsc::Receiver<Envelope>) {
        let (to_kernel_tx, to_kernel_rx) = tokio::sync::mpsc::channel(16);
        let (from_kernel_tx, from_kernel_rx) = tokio::sync::mpsc::channel(16);
        let conn = Arc::new(DuplexConnection {
            inbound: AsyncMutex::new(to_kernel_rx),
            outbound: from_kernel_tx,
            closed: AtomicBool::new(false),
        });
        (conn, to_kernel_tx, from_kernel_rx)
    }

    #[tokio::test]
    async fn request_gets_dispatched_and_response_written_back() {
        let (conn, to_kernel, mut from_kernel) = make_pair();
        let kernel = Kernel::new(conn);
        kernel.spawn(Arc::new(EchoRequests { calls: AtomicUsize::new(0) }), Arc::new(NoopNotifications));

        to_kernel
            .send(Envelope::Request(mcplex_protocol::envelope::Request {
                jsonrpc: mcplex_protocol::envelope::Version,
                method: "echo".into(),
                params: Some(serde_json::json!({"x": 1})),
                id: RequestId::Number(1),
            }))
            .await
            .unwrap();

        let response = from_kernel.recv().await.unwrap();
        match response {
            Envelope::Response(r) => assert_eq!(r.into_result().unwrap(), serde_json::json!({"x": 1})),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_notification_fires_the_matching_incoming_cancel() {
        let (conn, to_kernel, _from_kernel) = make_pair();
        let kernel = Kernel::new(conn);
        let handle = kernel.handle();
        kernel.spawn(Arc::new(EchoRequests { calls: AtomicUsize::new(0) }), Arc::new(NoopNotifications));

        let cancel = CancellationToken::new();
        handle.inner.incoming_cancels.insert(RequestId::Number(42), cancel.clone());

        to_kernel
            .send(Envelope::Notification(mcplex_protocol::envelope::Notification {
                jsonrpc: mcplex_protocol::envelope::Version,
                method: CANCELLED_NOTIFICATION.into(),
                params: Some(serde_json::json!({"requestId": 42})),
            }))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn response_resolves_outbound_waiter() {
        let (conn, to_kernel, _from_kernel) = make_pair();
        let kernel = Kernel::new(conn);
        let handle = kernel.handle();
        kernel.spawn(Arc::new(EchoRequests { calls: AtomicUsize::new(0) }), Arc::new(NoopNotifications));

        let h2 = handle.clone();
        let waiter = tokio::spawn(async move {
            h2.send_request("ping", None, CancellationToken::new()).await
        });
        tokio::task::yield_now().await;

        to_kernel
            .send(Envelope::Response(Response::success(RequestId::Number(1), serde_json::json!("pong"))))
            .await
            .unwrap();

        let result = waiter.await.unwrap();
        assert_eq!(result.unwrap(), serde_json::json!("pong"));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (conn, _to_kernel, _from_kernel) = make_pair();
        let kernel = Kernel::new(conn);
        let handle = kernel.handle();

        let fire_count = Arc::new(AtomicUsize::new(0));
        let f1 = fire_count.clone();
        handle.close(&move || { f1.fetch_add(1, Ordering::SeqCst); }).await;
        let f2 = fire_count.clone();
        handle.close(&move || { f2.fetch_add(1, Ordering::SeqCst); }).await;

        assert_eq!(fire_count.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), SessionState::Closed);
    }
}
