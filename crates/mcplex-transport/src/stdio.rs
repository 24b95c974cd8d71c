//! Line-delimited stdio transport (spec §4.2.1).
//!
//! One JSON frame per `\n`-terminated line on stdin/stdout; diagnostics
//! never touch stdout — callers are expected to route `tracing` to
//! stderr. A single reader task drains the input stream into a bounded
//! channel so `Connection::read` never blocks on the process's actual
//! stdin handle; `Close` signals that task via a [`CancellationToken`] and
//! is safe to call more than once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use mcplex_protocol::Envelope;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::{decode_frame, encode_frame};
use crate::error::{TransportError, TransportResult};
use crate::traits::{Connection, Transport};

const CHANNEL_CAPACITY: usize = 256;

type BoxedRead = std::pin::Pin<Box<dyn tokio::io::AsyncRead + Send>>;
type BoxedWrite = std::pin::Pin<Box<dyn AsyncWrite + Send>>;

/// A factory for exactly one [`StdioConnection`] bound to either the
/// process's real stdio or, for tests, an arbitrary duplex pair (spec
/// §9's "Raw" stream source in the teacher's transport, generalized here
/// so unit tests never touch real process stdio).
pub struct StdioTransport {
    max_message_bytes: Option<usize>,
    source: Mutex<Option<(BoxedRead, BoxedWrite)>>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self::from_raw(Box::pin(tokio::io::stdin()), Box::pin(tokio::io::stdout()))
    }

    pub fn with_max_message_bytes(mut self, limit: usize) -> Self {
        self.max_message_bytes = Some(limit);
        self
    }

    /// Attach to an arbitrary reader/writer pair — used in tests and when
    /// driving a child process's piped stdio instead of this process's
    /// own.
    pub fn from_raw(
        reader: impl tokio::io::AsyncRead + Send + 'static,
        writer: impl AsyncWrite + Send + 'static,
    ) -> Self {
        Self {
            max_message_bytes: None,
            source: Mutex::new(Some((Box::pin(reader), Box::pin(writer)))),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> TransportResult<Box<dyn Connection>> {
        let (reader, writer) = self
            .source
            .lock()
            .await
            .take()
            .ok_or_else(|| TransportError::Malformed("stdio transport already connected".into()))?;
        Ok(Box::new(StdioConnection::spawn(reader, writer, self.max_message_bytes)))
    }
}

pub struct StdioConnection {
    inbound: Mutex<mpsc::Receiver<TransportResult<Envelope>>>,
    writer: Mutex<BoxedWrite>,
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
    reader_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StdioConnection {
    fn spawn(reader: BoxedRead, writer: BoxedWrite, max_message_bytes: Option<usize>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!("stdio reader task cancelled");
                        break;
                    }
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(line)) if line.trim().is_empty() => continue,
                            Ok(Some(line)) => {
                                trace!(bytes = line.len(), "stdio read frame");
                                let result = decode_frame(line.as_bytes(), max_message_bytes);
                                if tx.send(result).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {
                                debug!("stdio reached EOF");
                                break;
                            }
                            Err(err) => {
                                warn!(error = %err, "stdio read error");
                                let _ = tx.send(Err(TransportError::Io(err))).await;
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self {
            inbound: Mutex::new(rx),
            writer: Mutex::new(writer),
            closed: Arc::new(AtomicBool::new(false)),
            cancel,
            reader_task: Mutex::new(Some(reader_task)),
        }
    }
}

#[async_trait]
impl Connection for StdioConnection {
    async fn read(&self) -> TransportResult<Envelope> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(result) => result,
            None => Err(TransportError::ConnectionClosed),
        }
    }

    async fn write(&self, envelope: &Envelope) -> TransportResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        let mut bytes = encode_frame(envelope)?;
        bytes.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Ok(());
        }
        self.cancel.cancel();
        if let Some(handle) = self.reader_task.lock().await.take() {
            let _ = handle.await;
        }
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_protocol::{Notification, Version};

    fn ping() -> Envelope {
        Envelope::Notification(Notification {
            jsonrpc: Version,
            method: "ping".into(),
            params: None,
        })
    }

    #[tokio::test]
    async fn writes_one_frame_per_line() {
        let (client, mut server) = tokio::io::duplex(4096);
        let (read_half, write_half) = tokio::io::split(client);
        let transport = StdioTransport::from_raw(read_half, write_half);
        let conn = transport.connect().await.unwrap();

        conn.write(&ping()).await.unwrap();

        let mut buf = vec![0u8; 256];
        use tokio::io::AsyncReadExt;
        let n = server.read(&mut buf).await.unwrap();
        let text = String::from_utf8(buf[..n].to_vec()).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
    }

    #[tokio::test]
    async fn read_returns_connection_closed_after_close() {
        let (client, _server) = tokio::io::duplex(4096);
        let (read_half, write_half) = tokio::io::split(client);
        let transport = StdioTransport::from_raw(read_half, write_half);
        let conn = transport.connect().await.unwrap();

        conn.close().await.unwrap();
        conn.close().await.unwrap(); // idempotent
        let err = conn.read().await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    #[tokio::test]
    async fn session_id_is_empty_for_stdio() {
        let (client, _server) = tokio::io::duplex(4096);
        let (read_half, write_half) = tokio::io::split(client);
        let transport = StdioTransport::from_raw(read_half, write_half);
        let conn = transport.connect().await.unwrap();
        assert!(conn.session_id().is_none());
    }
}
