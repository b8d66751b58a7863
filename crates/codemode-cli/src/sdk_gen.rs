use std::path::PathBuf;

use anyhow::{Context, Result};

use codemode_mcp::protocol::ClientInfo;
use codemode_mcp::{StdioRpcClient, ToolServerConfig, generate_sdk};

/// Generate the declaration file for every tool the server exposes.
pub async fn run_sdk_gen(server: ToolServerConfig, output: PathBuf) -> Result<()> {
    let count = generate_sdk(&server, &output)
        .await
        .with_context(|| format!("SDK generation from '{}' failed", server.display_command()))?;
    println!("Generated {count} declarations into {}", output.display());
    Ok(())
}

/// Print the tools a server exposes, one per line.
pub async fn run_list_tools(server: ToolServerConfig) -> Result<()> {
    let client = StdioRpcClient::connect(&server)
        .with_context(|| format!("Failed to start '{}'", server.display_command()))?;

    let listed = async {
        client.handshake(ClientInfo::default()).await?;
        client.list_tools().await
    }
    .await;
    client.shutdown().await;

    let tools = listed.context("Failed to list tools")?;
    for tool in &tools {
        match tool.description.as_deref() {
            Some(description) => println!("{} - {}", tool.name, description),
            None => println!("{}", tool.name),
        }
    }
    println!("({} tools)", tools.len());
    Ok(())
}
