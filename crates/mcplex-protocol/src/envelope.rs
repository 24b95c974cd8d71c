//! The JSON-RPC 2.0 envelope (spec §3 "Envelope", §4.1 "Wire framing").
//!
//! Exactly one of four shapes travels per frame: request (id + method),
//! notification (method, no id), success response (id + result), or error
//! response (id + error). We model that as one `#[serde(untagged)]` enum
//! so a transport can decode a raw frame without knowing in advance which
//! shape it is, then classify it (spec §4.4).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

/// A request or response identifier. The spec requires preserving the
/// originator's JSON type (string vs integer) across a round trip, so this
/// is untagged rather than normalized to one representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: Version,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: Version,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    Success { result: Value },
    Error { error: RpcError },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: Version,
    #[serde(flatten)]
    pub payload: ResponsePayload,
    pub id: RequestId,
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: Version,
            payload: ResponsePayload::Success { result },
            id,
        }
    }

    pub fn error(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: Version,
            payload: ResponsePayload::Error { error },
            id,
        }
    }

    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.payload {
            ResponsePayload::Success { result } => Ok(result),
            ResponsePayload::Error { error } => Err(error),
        }
    }
}

/// The union of all four frame shapes. `#[serde(untagged)]` tries each
/// variant in order, so `Request` (which requires both `id` and `method`)
/// is tried before `Notification`/`Response` to resolve the ambiguity
/// between "has id" and "has method".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

/// A marker type that only ever serializes as `"2.0"` and only ever
/// deserializes from `"2.0"`, so a frame missing or misreporting
/// `jsonrpc` fails to parse rather than silently being accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version;

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if raw == JSONRPC_VERSION {
            Ok(Version)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version \"{raw}\", expected \"{JSONRPC_VERSION}\""
            )))
        }
    }
}

impl Envelope {
    /// Classifies a raw, already-parsed JSON value the way the session
    /// kernel does in spec §4.4, without committing to a concrete
    /// envelope type first — used by the framer to reject malformed
    /// frames with a precise diagnostic before attempting a typed decode.
    pub fn classify_raw(value: &Value) -> Result<FrameKind, String> {
        let obj = value.as_object().ok_or("frame is not a JSON object")?;
        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err("missing or invalid \"jsonrpc\":\"2.0\"".to_string());
        }
        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");
        if has_result && has_error {
            return Err("frame carries both \"result\" and \"error\"".to_string());
        }
        let has_id = obj.contains_key("id");
        let has_method = obj.get("method").and_then(Value::as_str).is_some();
        match (has_id, has_method) {
            (true, true) => Ok(FrameKind::Request),
            (true, false) if has_result || has_error => Ok(FrameKind::Response),
            (false, true) => Ok(FrameKind::Notification),
            _ => Err("frame has neither a valid \"method\" nor \"result\"/\"error\"".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Request,
    Response,
    Notification,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_id_preserves_json_type() {
        let as_number: RequestId = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(as_number, RequestId::Number(7));
        let as_string: RequestId = serde_json::from_value(json!("7")).unwrap();
        assert_eq!(as_string, RequestId::String("7".to_string()));
        assert_ne!(as_number, as_string);
    }

    #[test]
    fn envelope_round_trips_each_shape() {
        let req = Envelope::Request(Request {
            jsonrpc: Version,
            method: "ping".into(),
            params: None,
            id: RequestId::Number(1),
        });
        let json = serde_json::to_string(&req).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Envelope::Request(_)));
    }

    #[test]
    fn classify_rejects_missing_jsonrpc_tag() {
        let err = Envelope::classify_raw(&json!({"method": "ping", "id": 1})).unwrap_err();
        assert!(err.contains("jsonrpc"));
    }

    #[test]
    fn classify_rejects_result_and_error_both_present() {
        let err = Envelope::classify_raw(
            &json!({"jsonrpc": "2.0", "id": 1, "result": {}, "error": {"code": -1, "message": "x"}}),
        )
        .unwrap_err();
        assert!(err.contains("both"));
    }

    #[test]
    fn classify_identifies_each_kind() {
        assert_eq!(
            Envelope::classify_raw(&json!({"jsonrpc": "2.0", "method": "ping", "id": 1})).unwrap(),
            FrameKind::Request
        );
        assert_eq!(
            Envelope::classify_raw(&json!({"jsonrpc": "2.0", "method": "notifications/cancelled"}))
                .unwrap(),
            FrameKind::Notification
        );
        assert_eq!(
            Envelope::classify_raw(&json!({"jsonrpc": "2.0", "id": 1, "result": {}})).unwrap(),
            FrameKind::Response
        );
    }
}
