//! Capability negotiation tree.
//!
//! Each side advertises a sparse tree of booleans/sub-records at
//! `initialize` time (spec §3 "Capability set"). `None` means "not
//! supported"; `Some(_)` (even if every field inside is `false`) means
//! "supported, with these sub-flags". Method dispatch consults this tree
//! to short-circuit calls the peer never advertised (spec §4.1, "a peer
//! MUST NOT invoke a method guarded by a capability the other side did not
//! advertise").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListChangedCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListChangedCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<ListChangedCapability>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ListChangedCapability {
    #[serde(rename = "listChanged", default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourcesCapability {
    #[serde(rename = "listChanged", default)]
    pub list_changed: bool,
    #[serde(default)]
    pub subscribe: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_server_capabilities_serialize_to_empty_object() {
        let caps = ServerCapabilities::default();
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn populated_capability_round_trips() {
        let caps = ServerCapabilities {
            tools: Some(ListChangedCapability { list_changed: true }),
            ..Default::default()
        };
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(json["tools"]["listChanged"], true);
        assert!(json.get("resources").is_none());
    }
}
