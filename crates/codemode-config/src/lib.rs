use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use codemode_mcp::ToolServerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
}

/// Limits applied to every sandboxed plan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSettings {
    /// Wall-clock budget per run, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// VM instructions between deadline checks.
    #[serde(default = "default_instruction_interval")]
    pub instruction_interval: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_instruction_interval() -> u32 {
    1000
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            instruction_interval: default_instruction_interval(),
        }
    }
}

impl SandboxSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level codemode configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeModeConfig {
    /// Directory plans are scoped to. Falls back to the current directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
    #[serde(default)]
    pub sandbox: SandboxSettings,
    /// Named tool-server launch configurations.
    #[serde(default)]
    pub tool_servers: HashMap<String, ToolServerConfig>,
}

impl CodeModeConfig {
    /// Look up a tool-server by name. The map key becomes the server name.
    pub fn tool_server(&self, name: &str) -> Option<ToolServerConfig> {
        self.tool_servers.get(name).map(|server| ToolServerConfig {
            name: name.to_string(),
            ..server.clone()
        })
    }
}

/// Resolve the codemode config directory (~/.codemode/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".codemode"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.codemode/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<CodeModeConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<CodeModeConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(CodeModeConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: CodeModeConfig = json5::from_str(&content)?;
    tracing::debug!(
        path = %path.display(),
        tool_servers = config.tool_servers.len(),
        "Loaded config"
    );
    Ok(config)
}

/// Ensure the config directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Save configuration to the default path.
pub fn save_config(config: &CodeModeConfig) -> Result<(), ConfigError> {
    let dir = ensure_config_dir()?;
    save_config_to(config, &dir.join("config.json5"))
}

/// Save configuration to a specific path. JSON is valid JSON5.
pub fn save_config_to(config: &CodeModeConfig, path: &Path) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CodeModeConfig::default();
        assert!(config.workspace_root.is_none());
        assert!(config.tool_servers.is_empty());
        assert_eq!(config.sandbox.timeout(), Duration::from_secs(30));
        assert_eq!(config.sandbox.instruction_interval, 1000);
    }

    #[test]
    fn test_json5_parse() {
        let json5_str = r#"{
            // plans live under here
            workspace_root: "/srv/agent",
            sandbox: { timeout_secs: 5 },
            tool_servers: {
                "claude-flow": {
                    command: "npx",
                    args: ["claude-flow", "mcp", "start"],
                    request_timeout_secs: 20,
                },
            },
        }"#;
        let config: CodeModeConfig = json5::from_str(json5_str).unwrap();
        assert_eq!(config.workspace_root, Some(PathBuf::from("/srv/agent")));
        assert_eq!(config.sandbox.timeout_secs, 5);
        assert_eq!(config.sandbox.instruction_interval, 1000);

        let server = config.tool_server("claude-flow").unwrap();
        assert_eq!(server.name, "claude-flow");
        assert_eq!(server.display_command(), "npx claude-flow mcp start");
        assert_eq!(server.request_timeout(), Some(Duration::from_secs(20)));
        assert!(config.tool_server("missing").is_none());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.json5")).unwrap();
        assert!(config.tool_servers.is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json5");
        std::fs::write(&path, "{ sandbox: ").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Json5(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json5");

        let mut config = CodeModeConfig::default();
        config.workspace_root = Some(PathBuf::from("/ws"));
        config.tool_servers.insert(
            "fs".into(),
            ToolServerConfig::from_command_line("mcp-fs --root /ws").unwrap(),
        );
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.workspace_root, config.workspace_root);
        assert_eq!(loaded.tool_server("fs").unwrap().args, vec!["--root", "/ws"]);
    }
}
