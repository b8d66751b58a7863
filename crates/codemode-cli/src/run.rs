use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::error;

use codemode_mcp::protocol::ClientInfo;
use codemode_mcp::{StdioRpcClient, ToolServerConfig};
use codemode_runtime::{SandboxConfig, SandboxExecutor, ToolExecutor};
use codemode_tools::{ExecutePlanTool, ScopeBoundary};

use crate::bridge::{McpToolExecutor, NoServerExecutor};

pub struct RunOptions {
    pub plan_path: String,
    pub workspace_root: PathBuf,
    pub dry_run: bool,
    pub timeout: Duration,
    pub instruction_interval: u32,
    pub server: Option<ToolServerConfig>,
}

/// Run one plan through the gateway and print its report.
///
/// Returns the process exit code: 0 on success, 1 if the plan failed,
/// 2 if the gateway refused it.
pub async fn run_plan(options: RunOptions) -> Result<i32> {
    let client = match &options.server {
        Some(server) => {
            let client = StdioRpcClient::connect(server)
                .with_context(|| format!("Failed to start '{}'", server.display_command()))?;
            if let Err(e) = client.handshake(ClientInfo::default()).await {
                client.shutdown().await;
                return Err(e).context("Tool-server handshake failed");
            }
            Some(Arc::new(client))
        }
        None => None,
    };

    let executor: Arc<dyn ToolExecutor> = match &client {
        Some(client) => Arc::new(McpToolExecutor::new(Arc::clone(client))),
        None => Arc::new(NoServerExecutor),
    };
    let sandbox = SandboxExecutor::with_config(
        executor,
        SandboxConfig {
            timeout: options.timeout,
            instruction_interval: options.instruction_interval,
        },
    );
    let tool = ExecutePlanTool::new(ScopeBoundary::new(&options.workspace_root), sandbox);

    let outcome = tool
        .handle_tool_call(json!({
            "planPath": options.plan_path,
            "dryRun": options.dry_run,
        }))
        .await;

    if let Some(client) = &client {
        client.shutdown().await;
    }

    match outcome {
        Ok(response) => {
            println!("{}", response.text_content());
            Ok(if response.is_error { 1 } else { 0 })
        }
        Err(e) => {
            error!(plan = %options.plan_path, "Plan rejected: {e}");
            eprintln!("{e}");
            Ok(2)
        }
    }
}
