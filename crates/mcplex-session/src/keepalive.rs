//! Periodic liveness checking (spec §4.5): issue `ping` on an interval and
//! close the session if a round trip doesn't come back in time.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::kernel::KernelHandle;

pub struct KeepAlive {
    interval: Duration,
    timeout: Duration,
}

impl KeepAlive {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: interval,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs until `handle` closes or `cancel` fires. Intended to be
    /// spawned as its own task alongside the kernel's read loop.
    pub async fn run(&self, handle: KernelHandle, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("keep-alive loop cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if handle.is_closed() {
                return;
            }

            let ping = handle.send_request("ping", None, CancellationToken::new());
            match tokio::time::timeout(self.timeout, ping).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    warn!(error = %err, "ping failed, closing session");
                    handle.close(&|| {}).await;
                    return;
                }
                Err(_) => {
                    warn!(timeout = ?self.timeout, "ping timed out, closing session");
                    handle.close(&|| {}).await;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Kernel, NotificationHandler, RequestHandler};
    use async_trait::async_trait;
    use mcplex_protocol::{Envelope, RpcError};
    use mcplex_transport::{Connection, TransportResult};
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct NeverRespondingConnection {
        closed: AtomicBool,
    }

    #[async_trait]
    impl Connection for NeverRespondingConnection {
        async fn read(&self) -> TransportResult<Envelope> {
            std::future::pending().await
        }
        async fn write(&self, _envelope: &Envelope) -> TransportResult<()> {
            Ok(())
        }
        async fn close(&self) -> TransportResult<()> {
            self.closed.store(true, Ordering::Release);
            Ok(())
        }
    }

    struct NoopRequests;
    #[async_trait]
    impl RequestHandler for NoopRequests {
        async fn handle(
            &self,
            _handle: &KernelHandle,
            _method: &str,
            _params: Option<Value>,
            _cancel: CancellationToken,
        ) -> Result<Value, RpcError> {
            Ok(Value::Null)
        }
    }

    struct NoopNotifications;
    #[async_trait]
    impl NotificationHandler for NoopNotifications {
        async fn handle(&self, _handle: &KernelHandle, _method: &str, _params: Option<Value>) {}
    }

    #[tokio::test]
    async fn unanswered_ping_closes_the_session() {
        let conn: Arc<dyn Connection> = Arc::new(NeverRespondingConnection { closed: AtomicBool::new(false) });
        let kernel = Kernel::new(conn);
        let handle = kernel.handle();
        kernel.spawn(Arc::new(NoopRequests), Arc::new(NoopNotifications));

        let keepalive = KeepAlive::new(Duration::from_millis(10)).with_timeout(Duration::from_millis(20));
        let cancel = CancellationToken::new();
        keepalive.run(handle.clone(), cancel).await;

        assert!(handle.is_closed());
    }
}
