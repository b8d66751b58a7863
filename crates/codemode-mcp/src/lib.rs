//! codemode-mcp: stdio JSON-RPC client and SDK generator for tool-servers.
//!
//! Spawns a tool-server subprocess, performs the `initialize` handshake,
//! discovers its tools with `tools/list`, and renders one typed declaration
//! per tool.

pub mod client;
pub mod codegen;
pub mod config;
pub mod error;
pub mod framing;
pub mod generator;
pub mod protocol;

pub use client::StdioRpcClient;
pub use config::ToolServerConfig;
pub use error::{GenerateError, RpcError};
pub use generator::generate_sdk;
