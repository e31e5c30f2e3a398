//! Tool descriptors, invocation requests and results.

use serde::{Deserialize, Serialize};

use super::types::AgentToolParameters;

/// Public description of a registered tool, as returned by discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub parameters: AgentToolParameters,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: AgentToolParameters,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// One block of tool output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// Any block type this bridge does not interpret (images, resources).
    #[serde(other)]
    Unsupported,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Unsupported => None,
        }
    }
}

/// A request to run one tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocationRequest {
    #[serde(rename = "name")]
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolInvocationRequest {
    pub fn new(tool_name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Outcome of a tool invocation. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocationResult {
    Success { content: Vec<ContentBlock> },
    Failure { message: String },
}

impl ToolInvocationResult {
    pub fn success_text(text: impl Into<String>) -> Self {
        Self::Success {
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// All text carried by the result, joined by newlines.
    pub fn text(&self) -> String {
        match self {
            Self::Success { content } => content
                .iter()
                .filter_map(ContentBlock::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Failure { message } => message.clone(),
        }
    }

    /// Value handed back to the model as the function response.
    pub fn to_model_value(&self) -> serde_json::Value {
        match self {
            Self::Success { .. } => serde_json::json!({ "content": self.text() }),
            Self::Failure { message } => serde_json::json!({ "error": message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_uses_input_schema_on_the_wire() {
        let descriptor = ToolDescriptor::new(
            "set-access-token",
            "stores a token",
            AgentToolParameters::object()
                .non_empty_string("accessToken", "token")
                .build(),
        );
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["inputSchema"]["type"], "object");
        assert!(value.get("parameters").is_none());

        let back: ToolDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn unknown_content_blocks_are_tolerated() {
        let blocks: Vec<ContentBlock> = serde_json::from_value(json!([
            {"type": "text", "text": "hello"},
            {"type": "image", "data": "...", "mimeType": "image/png"}
        ]))
        .unwrap();
        assert_eq!(blocks[0].as_text(), Some("hello"));
        assert_eq!(blocks[1], ContentBlock::Unsupported);
    }

    #[test]
    fn failure_maps_to_error_value_for_the_model() {
        let result = ToolInvocationResult::failure("missing credential");
        assert_eq!(result.to_model_value(), json!({ "error": "missing credential" }));
        assert!(!result.is_success());
    }
}
