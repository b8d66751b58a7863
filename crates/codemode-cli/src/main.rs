mod bridge;
mod run;
mod sdk_gen;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};

use codemode_config::CodeModeConfig;
use codemode_mcp::ToolServerConfig;

#[derive(Parser)]
#[command(name = "codemode", about = "Tool-server SDK generation and sandboxed plan execution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate tool declarations from a tool-server's `tools/list`
    SdkGen {
        /// Declaration file to write
        output: PathBuf,

        /// Named tool-server from the config file
        #[arg(short, long)]
        server: Option<String>,

        /// Command line of the tool-server, after `--`
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// List the tools a tool-server exposes
    Tools {
        /// Named tool-server from the config file
        #[arg(short, long)]
        server: Option<String>,

        /// Command line of the tool-server, after `--`
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Run a plan file through the execute_plan gateway
    Run {
        /// Plan path, relative to the workspace root
        plan_path: String,

        /// Workspace root (overrides config; defaults to the current directory)
        #[arg(short, long)]
        workspace_root: Option<PathBuf>,

        /// Only check that the plan compiles
        #[arg(long)]
        dry_run: bool,

        /// Wall-clock budget for the run (overrides config)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Named tool-server that capability calls are forwarded to
        #[arg(short, long)]
        server: Option<String>,

        /// Command line of the tool-server, after `--`
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Save a named tool-server to the config file
    AddServer {
        /// Name that `--server` refers to
        name: String,

        /// Per-request timeout for this server
        #[arg(long)]
        request_timeout_secs: Option<u64>,

        /// Command line of the tool-server, after `--`
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Check configuration
    Health,
}

fn main() -> Result<()> {
    // Reports and declarations go to stdout; diagnostics to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = codemode_config::load_config().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {e}");
        CodeModeConfig::default()
    });

    match cli.command {
        Commands::SdkGen {
            output,
            server,
            command,
        } => {
            let server = require_server(&config, server.as_deref(), &command)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(sdk_gen::run_sdk_gen(server, output))?;
        }
        Commands::Tools { server, command } => {
            let server = require_server(&config, server.as_deref(), &command)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(sdk_gen::run_list_tools(server))?;
        }
        Commands::Run {
            plan_path,
            workspace_root,
            dry_run,
            timeout_secs,
            server,
            command,
        } => {
            let server = resolve_server(&config, server.as_deref(), &command)?;
            let workspace_root = workspace_root
                .or_else(|| config.workspace_root.clone())
                .map_or_else(std::env::current_dir, |root| {
                    std::env::current_dir().map(|cwd| cwd.join(root))
                })?;
            let options = run::RunOptions {
                plan_path,
                workspace_root,
                dry_run,
                timeout: timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| config.sandbox.timeout()),
                instruction_interval: config.sandbox.instruction_interval,
                server,
            };

            let rt = tokio::runtime::Runtime::new()?;
            let code = rt.block_on(run::run_plan(options))?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::AddServer {
            name,
            request_timeout_secs,
            command,
        } => {
            // Strict load: a config file that fails to parse is never overwritten.
            let mut config = codemode_config::load_config()?;
            let server = server_entry(&name, &command, request_timeout_secs)?;
            println!("Saved tool server '{name}': {}", server.display_command());
            config.tool_servers.insert(name, server);
            codemode_config::save_config(&config)?;
        }
        Commands::Health => {
            println!("codemode is healthy");
            match codemode_config::config_file_path() {
                Ok(path) => println!("  config file: {}", path.display()),
                Err(e) => println!("  config file: unavailable ({e})"),
            }
            match &config.workspace_root {
                Some(root) => println!("  workspace root: {}", root.display()),
                None => println!("  workspace root: <current directory>"),
            }
            println!("  sandbox timeout: {}s", config.sandbox.timeout_secs);
            println!("  tool servers configured: {}", config.tool_servers.len());
            let mut names: Vec<_> = config.tool_servers.keys().collect();
            names.sort();
            for name in names {
                if let Some(server) = config.tool_server(name) {
                    println!("    {name}: {}", server.display_command());
                }
            }
        }
    }

    Ok(())
}

/// A named server from the config, a literal command line, or neither.
fn resolve_server(
    config: &CodeModeConfig,
    name: Option<&str>,
    command: &[String],
) -> Result<Option<ToolServerConfig>> {
    if let Some(name) = name {
        return config
            .tool_server(name)
            .map(Some)
            .ok_or_else(|| anyhow!("Unknown tool server '{name}'"));
    }

    let Some((program, args)) = command.split_first() else {
        return Ok(None);
    };
    Ok(Some(ToolServerConfig {
        name: program.clone(),
        command: program.clone(),
        args: args.to_vec(),
        env: HashMap::new(),
        request_timeout_secs: None,
    }))
}

fn server_entry(
    name: &str,
    command: &[String],
    request_timeout_secs: Option<u64>,
) -> Result<ToolServerConfig> {
    let Some((program, args)) = command.split_first() else {
        bail!("No command given for tool server '{name}': pass -- COMMAND...");
    };
    Ok(ToolServerConfig {
        name: name.to_string(),
        command: program.clone(),
        args: args.to_vec(),
        env: HashMap::new(),
        request_timeout_secs,
    })
}

fn require_server(
    config: &CodeModeConfig,
    name: Option<&str>,
    command: &[String],
) -> Result<ToolServerConfig> {
    match resolve_server(config, name, command)? {
        Some(server) => Ok(server),
        None => bail!("No tool server given: pass --server NAME or -- COMMAND..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_with_trailing_command() {
        let cli = Cli::try_parse_from([
            "codemode",
            "run",
            "sessions/s1/artifacts/plan.lua",
            "--dry-run",
            "--",
            "npx",
            "claude-flow",
            "mcp",
            "start",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                plan_path,
                dry_run,
                command,
                server,
                ..
            } => {
                assert_eq!(plan_path, "sessions/s1/artifacts/plan.lua");
                assert!(dry_run);
                assert!(server.is_none());
                assert_eq!(command, vec!["npx", "claude-flow", "mcp", "start"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_parses_add_server() {
        let cli = Cli::try_parse_from([
            "codemode",
            "add-server",
            "flow",
            "--request-timeout-secs",
            "90",
            "--",
            "npx",
            "claude-flow",
            "mcp",
            "start",
        ])
        .unwrap();

        match cli.command {
            Commands::AddServer {
                name,
                request_timeout_secs,
                command,
            } => {
                let server = server_entry(&name, &command, request_timeout_secs).unwrap();
                assert_eq!(server.name, "flow");
                assert_eq!(server.command, "npx");
                assert_eq!(server.args, vec!["claude-flow", "mcp", "start"]);
                assert_eq!(server.request_timeout_secs, Some(90));
            }
            _ => panic!("expected add-server"),
        }
    }

    #[test]
    fn test_server_entry_needs_a_command() {
        let err = server_entry("flow", &[], None).unwrap_err();
        assert!(err.to_string().contains("flow"));
    }

    #[test]
    fn test_resolve_server_prefers_named_config() {
        let mut config = CodeModeConfig::default();
        config.tool_servers.insert(
            "fs".into(),
            ToolServerConfig::from_command_line("mcp-fs /ws").unwrap(),
        );

        let named = resolve_server(&config, Some("fs"), &["ignored".into()])
            .unwrap()
            .unwrap();
        assert_eq!(named.name, "fs");
        assert_eq!(named.display_command(), "mcp-fs /ws");

        assert!(resolve_server(&config, Some("nope"), &[]).is_err());
        assert!(resolve_server(&config, None, &[]).unwrap().is_none());
    }

    #[test]
    fn test_literal_command_keeps_arguments_intact() {
        let config = CodeModeConfig::default();
        let server = resolve_server(&config, None, &["node".into(), "my server.js".into()])
            .unwrap()
            .unwrap();
        assert_eq!(server.command, "node");
        assert_eq!(server.args, vec!["my server.js"]);
        assert!(require_server(&config, None, &[]).is_err());
    }
}
