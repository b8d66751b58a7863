//! Stdio JSON-RPC client for a tool-server subprocess.
//!
//! Requests are written to the child's stdin one line at a time; a reader
//! task classifies stdout lines and settles pending requests by `id`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use codemode_types::ToolDescriptor;

use crate::config::ToolServerConfig;
use crate::error::RpcError;
use crate::framing::{Frame, LineBuffer};
use crate::protocol::*;

const READ_CHUNK: usize = 8 * 1024;

#[derive(Default)]
struct PendingRequests {
    waiters: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    /// Set once stdout is gone; no response can arrive after that.
    closed: bool,
}

type SharedPending = Arc<Mutex<PendingRequests>>;

/// A connection to one tool-server subprocess.
pub struct StdioRpcClient {
    name: String,
    request_timeout: Option<Duration>,
    next_id: AtomicU64,
    stdin: Mutex<Option<ChildStdin>>,
    process: Mutex<Option<Child>>,
    pending: SharedPending,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
}

impl StdioRpcClient {
    /// Spawn the tool-server with piped stdin/stdout and inherited stderr.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(config: &ToolServerConfig) -> Result<Self, RpcError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| RpcError::Spawn {
            command: config.display_command(),
            source,
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(RpcError::NotRunning);
        };

        let name = if config.name.is_empty() {
            config.command.clone()
        } else {
            config.name.clone()
        };

        let pending = SharedPending::default();
        let reader_handle = Self::spawn_reader(stdout, pending.clone(), name.clone());

        info!(
            server = %name,
            command = %config.display_command(),
            pid = ?child.id(),
            "Tool-server started"
        );

        Ok(Self {
            name,
            request_timeout: config.request_timeout(),
            next_id: AtomicU64::new(1),
            stdin: Mutex::new(Some(stdin)),
            process: Mutex::new(Some(child)),
            pending,
            reader_handle: Mutex::new(Some(reader_handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a request and wait for the response with the same `id`.
    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Register before writing so a fast response cannot be missed.
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.closed {
                return Err(RpcError::Closed {
                    method: method.to_string(),
                    id,
                });
            }
            pending.waiters.insert(id, tx);
        }

        let line = JsonRpcMessage::request(id, method, params)
            .to_line()
            .map_err(RpcError::Encode);
        let written = match line {
            Ok(line) => self.write_line(&line).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.pending.lock().await.waiters.remove(&id);
            return Err(e);
        }

        debug!(server = %self.name, %method, %id, "Sent RPC request");

        let received = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.lock().await.waiters.remove(&id);
                    return Err(RpcError::Timeout {
                        method: method.to_string(),
                        id,
                        secs: limit.as_secs(),
                    });
                }
            },
            None => rx.await,
        };

        let response = received.map_err(|_| RpcError::Closed {
            method: method.to_string(),
            id,
        })?;

        if let Some(err) = response.error {
            return Err(RpcError::Remote {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Send a notification. No response is expected or awaited.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), RpcError> {
        let line = JsonRpcMessage::notification(method, params)
            .to_line()
            .map_err(RpcError::Encode)?;
        self.write_line(&line).await?;
        debug!(server = %self.name, %method, "Sent notification");
        Ok(())
    }

    /// `initialize` followed by the `notifications/initialized` notification.
    pub async fn handshake(&self, client_info: ClientInfo) -> Result<InitializeResult, RpcError> {
        let params = serde_json::to_value(InitializeParams::new(client_info))
            .map_err(RpcError::Encode)?;
        let raw = self.send(METHOD_INITIALIZE, Some(params)).await?;

        let result: InitializeResult = serde_json::from_value(raw).unwrap_or_else(|e| {
            warn!(server = %self.name, "Unrecognized initialize result: {e}");
            InitializeResult::default()
        });

        self.notify(METHOD_INITIALIZED, None).await?;

        info!(
            server = %self.name,
            server_name = ?result.server_info.as_ref().map(|s| s.name.as_str()),
            protocol = ?result.protocol_version,
            "Tool-server initialized"
        );

        Ok(result)
    }

    /// Fetch every tool the server exposes, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, RpcError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = serde_json::to_value(ListToolsParams {
                cursor: cursor.clone(),
            })
            .map_err(RpcError::Encode)?;
            let raw = self.send(METHOD_TOOLS_LIST, Some(params)).await?;
            let page: ListToolsResult =
                serde_json::from_value(raw).map_err(|source| RpcError::InvalidResult {
                    method: METHOD_TOOLS_LIST.into(),
                    source,
                })?;

            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }

        info!(server = %self.name, tool_count = tools.len(), "Listed tools");
        Ok(tools)
    }

    /// Invoke a tool via `tools/call` and return the raw result object.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, RpcError> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })
        .map_err(RpcError::Encode)?;
        debug!(server = %self.name, tool = %name, "Calling tool");
        self.send(METHOD_TOOLS_CALL, Some(params)).await
    }

    /// Terminate the subprocess. Pending requests resolve with `Closed`.
    pub async fn shutdown(&self) {
        self.stdin.lock().await.take();

        if let Some(mut child) = self.process.lock().await.take() {
            match child.kill().await {
                Ok(()) => info!(server = %self.name, "Tool-server terminated"),
                Err(e) => warn!(server = %self.name, "Failed to kill tool-server: {e}"),
            }
        }

        if let Some(handle) = self.reader_handle.lock().await.take() {
            handle.abort();
        }

        let mut pending = self.pending.lock().await;
        pending.closed = true;
        pending.waiters.clear();
    }

    async fn write_line(&self, line: &str) -> Result<(), RpcError> {
        let mut stdin = self.stdin.lock().await;
        let stdin = stdin.as_mut().ok_or(RpcError::NotRunning)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Spawn the stdout reader task that settles pending requests.
    fn spawn_reader(stdout: ChildStdout, pending: SharedPending, server: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut stdout = stdout;
            let mut buffer = LineBuffer::new();
            let mut chunk = vec![0u8; READ_CHUNK];

            loop {
                let n = match stdout.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        warn!(server = %server, "Failed to read tool-server output: {e}");
                        break;
                    }
                };

                for frame in buffer.push(&chunk[..n]) {
                    match frame {
                        Frame::Response(resp) => {
                            let Some(id) = resp.id else { continue };
                            let waiter = pending.lock().await.waiters.remove(&id);
                            match waiter {
                                Some(tx) => {
                                    let _ = tx.send(resp);
                                }
                                None => {
                                    warn!(server = %server, %id, "Received response for unknown request ID");
                                }
                            }
                        }
                        Frame::Message(msg) => {
                            debug!(server = %server, method = %msg.method, "Ignoring server-originated message");
                        }
                        Frame::Ignorable(reason) => {
                            debug!(server = %server, ?reason, "Skipping non-protocol output line");
                        }
                    }
                }
            }

            if !buffer.remainder().is_empty() {
                debug!(
                    server = %server,
                    bytes = buffer.remainder().len(),
                    "Discarding incomplete trailing line"
                );
            }

            let mut pending = pending.lock().await;
            pending.closed = true;
            let orphaned = pending.waiters.len();
            pending.waiters.clear();

            info!(server = %server, orphaned, "Tool-server output closed");
        })
    }
}

impl Drop for StdioRpcClient {
    fn drop(&mut self) {
        // kill_on_drop on the Child handles process termination
        if let Ok(mut handle) = self.reader_handle.try_lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
            }
        }
    }
}
