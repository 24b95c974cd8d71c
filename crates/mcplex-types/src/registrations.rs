//! Static metadata for the four kinds of things a server registers:
//! tools, resources (+ templates), and prompts. These are the
//! wire-serializable halves of a registration — the handler closures live
//! alongside them in `mcplex-server::registry`, not here, because this
//! crate has no notion of async or of a request context.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-Schema object. The spec requires `type: "object"` for tool
/// input/output schemas; callers build this with `serde_json::json!`.
pub type Schema = Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Schema,
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Schema>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, Value>>,
}

impl Tool {
    /// Enforces the data-model invariant from spec §3: the input schema
    /// must be present and declare `type: "object"`, and the same holds
    /// for the output schema when supplied.
    pub fn validate_shape(&self) -> Result<(), String> {
        validate_object_schema(&self.input_schema, "inputSchema")?;
        if let Some(schema) = &self.output_schema {
            validate_object_schema(schema, "outputSchema")?;
        }
        Ok(())
    }
}

fn validate_object_schema(schema: &Schema, field: &str) -> Result<(), String> {
    if !schema.is_object() {
        return Err(format!("{field} must be a JSON object"));
    }
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => Ok(()),
        Some(other) => Err(format!("{field} must declare type \"object\", got \"{other}\"")),
        None => Err(format!("{field} is missing a \"type\" field")),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, Value>>,
}

/// Identical shape to [`Resource`] but keyed by a `{placeholder}` template
/// string instead of a concrete URI (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTemplate {
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, Value>>,
}

/// A client-declared filesystem (or other) root the server may enumerate
/// via `roots/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Root {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: super::content::ContentBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_shape_requires_object_input_schema() {
        let mut tool = Tool {
            name: "greet".into(),
            title: None,
            description: None,
            input_schema: json!({"type": "object", "properties": {}}),
            output_schema: None,
            meta: None,
        };
        assert!(tool.validate_shape().is_ok());

        tool.input_schema = json!({"type": "string"});
        assert!(tool.validate_shape().is_err());
    }

    #[test]
    fn resource_template_serializes_uri_template_field() {
        let template = ResourceTemplate {
            uri_template: "file:///{path}".into(),
            name: "fs".into(),
            description: None,
            mime_type: None,
            meta: None,
        };
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["uriTemplate"], "file:///{path}");
    }
}
