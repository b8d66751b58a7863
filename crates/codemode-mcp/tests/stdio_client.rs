//! Drives the real stdio client against scripted `/bin/sh` tool-servers.
#![cfg(unix)]

use std::collections::HashMap;

use codemode_mcp::protocol::ClientInfo;
use codemode_mcp::{RpcError, StdioRpcClient, ToolServerConfig, generate_sdk};

const HANDSHAKE_AND_LIST: &str = r#"
echo "fake tool-server booting"
read -r line
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fake","version":"0.0.1"}}}'
read -r line
read -r line
echo 'log: listing tools'
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"Echo a message","inputSchema":{"type":"object","properties":{"msg":{"type":"string"}},"required":["msg"]}},{"name":"swarm_init","inputSchema":{"type":"object","properties":{"topology":{"type":"string","enum":["mesh","star"]}}}}]}}'
read -r line
"#;

fn sh(script: &str) -> ToolServerConfig {
    ToolServerConfig {
        name: "fake".into(),
        command: "sh".into(),
        args: vec!["-c".into(), script.into()],
        env: HashMap::new(),
        request_timeout_secs: None,
    }
}

#[tokio::test]
async fn test_handshake_then_list_tools() {
    let client = StdioRpcClient::connect(&sh(HANDSHAKE_AND_LIST)).unwrap();

    let init = client.handshake(ClientInfo::default()).await.unwrap();
    assert_eq!(init.server_info.unwrap().name, "fake");

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].name, "echo");
    assert_eq!(tools[0].description.as_deref(), Some("Echo a message"));
    assert_eq!(tools[1].name, "swarm_init");

    client.shutdown().await;
}

#[tokio::test]
async fn test_out_of_order_responses_match_by_id() {
    let script = r#"
read -r first
read -r second
id1=$(printf '%s' "$first" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
m1=$(printf '%s' "$first" | sed -n 's/.*"method":"\([^"]*\)".*/\1/p')
id2=$(printf '%s' "$second" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
m2=$(printf '%s' "$second" | sed -n 's/.*"method":"\([^"]*\)".*/\1/p')
printf '{"jsonrpc":"2.0","id":%s,"result":"%s"}\n' "$id2" "$m2"
printf '{"jsonrpc":"2.0","id":%s,"result":"%s"}\n' "$id1" "$m1"
read -r rest
"#;
    let client = StdioRpcClient::connect(&sh(script)).unwrap();

    let (alpha, beta) = tokio::join!(client.send("alpha", None), client.send("beta", None));
    assert_eq!(alpha.unwrap(), "alpha");
    assert_eq!(beta.unwrap(), "beta");

    client.shutdown().await;
}

#[tokio::test]
async fn test_handshake_rejection_is_reported() {
    let script = r#"
read -r line
echo '{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"unsupported protocol"}}'
read -r line
"#;
    let client = StdioRpcClient::connect(&sh(script)).unwrap();

    let err = client.handshake(ClientInfo::default()).await.unwrap_err();
    match err {
        RpcError::Remote { method, code, message } => {
            assert_eq!(method, "initialize");
            assert_eq!(code, -32600);
            assert_eq!(message, "unsupported protocol");
        }
        other => panic!("expected remote error, got {other:?}"),
    }

    client.shutdown().await;
}

#[tokio::test]
async fn test_exit_settles_pending_requests() {
    let client = StdioRpcClient::connect(&sh("read -r line; exit 0")).unwrap();

    let err = client.send("tools/list", None).await.unwrap_err();
    assert!(matches!(err, RpcError::Closed { id: 1, .. }));

    // Later requests fail fast instead of hanging.
    let err = client.send("tools/list", None).await.unwrap_err();
    assert!(matches!(err, RpcError::Closed { .. } | RpcError::Io(_)));
}

#[tokio::test]
async fn test_optional_request_timeout() {
    let mut config = sh("read -r line; read -r never");
    config.request_timeout_secs = Some(1);
    let client = StdioRpcClient::connect(&config).unwrap();

    let err = client.send("tools/list", None).await.unwrap_err();
    assert!(matches!(err, RpcError::Timeout { secs: 1, .. }));

    client.shutdown().await;
}

#[tokio::test]
async fn test_generate_sdk_writes_one_declaration_per_tool() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("fake.d.ts");

    let count = generate_sdk(&sh(HANDSHAKE_AND_LIST), &output).await.unwrap();
    assert_eq!(count, 2);

    let content = std::fs::read_to_string(&output).unwrap();
    assert_eq!(content.matches("export function ").count(), 2);
    assert!(content.contains("/** Echo a message */"));
    assert!(content.contains("export function echo(params: { msg: string }): Promise<any>;"));
    assert!(content.contains(r#"export function swarm_init(params: { topology?: "mesh" | "star" }): Promise<any>;"#));
}

#[tokio::test]
async fn test_generate_sdk_failure_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("fake.d.ts");
    let script = r#"
read -r line
echo '{"jsonrpc":"2.0","id":1,"error":{"code":-32603,"message":"boot failed"}}'
read -r line
"#;

    let err = generate_sdk(&sh(script), &output).await.unwrap_err();
    assert!(err.to_string().contains("boot failed"));
    assert!(!output.exists());
}
