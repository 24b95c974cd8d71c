//! Shared frame validation used by both the stdio and SSE framers (spec
//! §4.1). Encoding is just `serde_json`; the part worth sharing is
//! rejecting malformed frames with the same diagnostics regardless of
//! which substrate carried them.

use mcplex_protocol::{Envelope, Error as ProtocolError};
use serde_json::Value;

use crate::error::{TransportError, TransportResult};

/// Decodes one frame, enforcing a `max_bytes` cap before ever touching the
/// JSON parser (spec §4.2.1 "a streaming... decoder" vs "buffers line-wise
/// and fails a message that exceeds the cap").
pub fn decode_frame(bytes: &[u8], max_bytes: Option<usize>) -> TransportResult<Envelope> {
    if let Some(limit) = max_bytes {
        if bytes.len() > limit {
            return Err(TransportError::FrameTooLarge { limit });
        }
    }
    let raw: Value = serde_json::from_slice(bytes).map_err(ProtocolError::from)?;
    Envelope::classify_raw(&raw).map_err(TransportError::Malformed)?;
    let envelope: Envelope = serde_json::from_value(raw).map_err(ProtocolError::from)?;
    Ok(envelope)
}

pub fn encode_frame(envelope: &Envelope) -> TransportResult<Vec<u8>> {
    serde_json::to_vec(envelope).map_err(|e| TransportError::Protocol(ProtocolError::from(e)))
}
