//! Executors that back the sandbox's `tools` table from the CLI.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;

use codemode_mcp::StdioRpcClient;
use codemode_runtime::ToolExecutor;

/// Forwards every capability call to a tool-server via `tools/call`.
pub struct McpToolExecutor {
    client: Arc<StdioRpcClient>,
}

impl McpToolExecutor {
    pub fn new(client: Arc<StdioRpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    async fn execute(&self, tool: &str, params: Value) -> Result<Value> {
        let result = self.client.call_tool(tool, params).await?;
        call_result_to_value(&result)
    }
}

/// Used when no tool-server is configured: every call is rejected.
pub struct NoServerExecutor;

#[async_trait]
impl ToolExecutor for NoServerExecutor {
    async fn execute(&self, tool: &str, _params: Value) -> Result<Value> {
        Err(anyhow!("no tool server configured (called {tool})"))
    }
}

/// Convert a `tools/call` result into the value a script receives.
///
/// `isError: true` becomes an error carrying the result text. Otherwise
/// `structuredContent` wins; failing that, text blocks are joined and
/// parsed as JSON when possible.
pub fn call_result_to_value(result: &Value) -> Result<Value> {
    let text = content_text(result);

    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        return Err(if text.is_empty() {
            anyhow!("tool returned an error")
        } else {
            anyhow!(text)
        });
    }

    if let Some(structured) = result.get("structuredContent") {
        return Ok(structured.clone());
    }

    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

fn content_text(result: &Value) -> String {
    let Some(blocks) = result.get("content").and_then(Value::as_array) else {
        return String::new();
    };

    blocks
        .iter()
        .filter_map(|block| {
            let kind = block.get("type").and_then(Value::as_str)?;
            match kind {
                "text" => block.get("text").and_then(Value::as_str).map(String::from),
                "image" | "audio" => {
                    let mime = block
                        .get("mimeType")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    Some(format!("[{kind}: {mime}]"))
                }
                "resource" => {
                    let uri = block
                        .pointer("/resource/uri")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    Some(format!("[resource: {uri}]"))
                }
                _ => None,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
