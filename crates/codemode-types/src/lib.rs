use serde::{Deserialize, Serialize};
use serde_json::Value;

// ──────────────────── Tool Discovery Types ────────────────────

/// A capability advertised by a tool-server in its `tools/list` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Tool name as the server knows it.
    pub name: String,
    /// Human-readable description, if the server provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool parameters.
    #[serde(default)]
    pub input_schema: Value,
}

/// Definition of a tool this system exposes to a host agent framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

// ──────────────────── Execution Types ────────────────────

/// Outcome of one sandboxed script run.
///
/// `error` is present iff `success` is false. `logs` is always present and
/// holds console output and capability-call activity in execution order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    /// Value returned by the script, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl ExecutionResult {
    /// A successful run, optionally carrying the script's return value.
    pub fn succeeded(result: Option<Value>, logs: Vec<String>) -> Self {
        Self {
            success: true,
            result,
            error: None,
            logs,
        }
    }

    /// A failed run (script error, capability error or timeout).
    pub fn failed(error: impl Into<String>, logs: Vec<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            logs,
        }
    }
}

// ──────────────────── Tool Response Types ────────────────────

/// A content block in a tool response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// Response returned to the host agent framework for a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolResponse {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResponse {
    /// A single text block response.
    pub fn text(text: impl Into<String>, is_error: bool) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error,
        }
    }

    /// Concatenated text of all text blocks.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
