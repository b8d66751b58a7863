use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How to launch a tool-server subprocess speaking NDJSON JSON-RPC on stdio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    /// Display name for this tool-server.
    #[serde(default)]
    pub name: String,
    /// Executable to spawn.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Per-request timeout. `None` waits until the server answers or exits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl ToolServerConfig {
    /// Build a config from a single command line such as `"npx claude-flow mcp start"`.
    ///
    /// The line is split on whitespace; the first word is the executable.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(String::from);
        let command = words.next()?;
        Some(Self {
            name: command.clone(),
            command,
            args: words.collect(),
            env: HashMap::new(),
            request_timeout_secs: None,
        })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// The full command line, for logs.
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
