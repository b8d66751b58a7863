//! End-to-end SDK generation against a live tool-server.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::client::StdioRpcClient;
use crate::codegen::generate_declarations;
use crate::config::ToolServerConfig;
use crate::error::GenerateError;
use crate::protocol::ClientInfo;

/// Connect, handshake, list tools, and write their declarations to `output`.
///
/// The subprocess is terminated before returning, on success or failure.
/// Nothing is written unless every step succeeds. Returns the number of
/// declarations written.
pub async fn generate_sdk(config: &ToolServerConfig, output: &Path) -> Result<usize, GenerateError> {
    info!(command = %config.display_command(), "Starting tool-server");
    let client = StdioRpcClient::connect(config)?;

    let outcome = fetch_and_write(&client, output).await;
    client.shutdown().await;

    match &outcome {
        Ok(count) => info!(count, output = %output.display(), "SDK written"),
        Err(e) => error!(server = %client.name(), "SDK generation failed: {e}"),
    }
    outcome
}

async fn fetch_and_write(client: &StdioRpcClient, output: &Path) -> Result<usize, GenerateError> {
    client.handshake(ClientInfo::default()).await?;
    let tools = client.list_tools().await?;

    info!(count = tools.len(), "Generating SDK");
    let content = generate_declarations(&tools);
    write_atomically(output, &content).await?;

    Ok(tools.len())
}

/// Write to a sibling temp file and rename it into place.
async fn write_atomically(path: &Path, content: &str) -> Result<(), GenerateError> {
    let write_err = |source| GenerateError::Write {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let temp = temp_path(path);
    if let Err(e) = tokio::fs::write(&temp, content).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(write_err(e));
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(write_err(e));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_is_sibling() {
        let temp = temp_path(Path::new("/out/sdk/claude-flow.d.ts"));
        assert_eq!(temp, PathBuf::from("/out/sdk/claude-flow.d.ts.tmp"));
    }

    #[tokio::test]
    async fn test_write_atomically_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("sdk.d.ts");
        write_atomically(&target, "export {};\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "export {};\n");
        assert!(!temp_path(&target).exists());
    }

    #[tokio::test]
    async fn test_spawn_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sdk.d.ts");
        let config =
            ToolServerConfig::from_command_line("/nonexistent/codemode-tool-server --stdio").unwrap();

        let err = generate_sdk(&config, &target).await.unwrap_err();
        assert!(matches!(err, GenerateError::Rpc(crate::RpcError::Spawn { .. })));
        assert!(!target.exists());
    }
}
