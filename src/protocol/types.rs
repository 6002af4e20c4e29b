//! Tool-facing MCP types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool as advertised by `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Invocation name
    pub name: String,
    /// What the tool does, shown to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the arguments object
    pub input_schema: Value,
    /// Behavioral hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

/// Behavioral hints derived from the HTTP verb
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    /// Calling the tool leaves remote state untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    /// Calling the tool may delete remote state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    /// The tool talks to systems outside the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// One content block of a tool result. Only text is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Plain text block
    Text {
        /// Block body
        text: String,
    },
}

impl Content {
    /// Wrap a string in a text block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Borrow the block body
    #[must_use]
    pub fn as_text(&self) -> &str {
        let Self::Text { text } = self;
        text
    }
}

/// Name and version of either side of the session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Info {
    /// Implementation name
    pub name: String,
    /// Implementation version
    pub version: String,
}

/// What the server advertises during `initialize`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Present when the server exposes tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

/// Tool-related capability flags
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    /// The server emits `notifications/tools/list_changed`
    #[serde(default)]
    pub list_changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_serializes_camel_case_and_skips_empty_hints() {
        let tool = Tool {
            name: "weather".into(),
            description: None,
            input_schema: json!({"type": "object"}),
            annotations: Some(ToolAnnotations {
                read_only_hint: Some(true),
                ..ToolAnnotations::default()
            }),
        };
        assert_eq!(
            serde_json::to_value(&tool).unwrap(),
            json!({
                "name": "weather",
                "inputSchema": {"type": "object"},
                "annotations": {"readOnlyHint": true}
            })
        );
    }

    #[test]
    fn content_is_tagged_text() {
        let value = serde_json::to_value(Content::text("hi")).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hi"}));
        assert_eq!(Content::text("hi").as_text(), "hi");
    }
}
