use thiserror::Error;

/// Failures talking to a tool-server.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to spawn tool-server `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tool-server I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("tool-server rejected '{method}' [{code}]: {message}")]
    Remote {
        method: String,
        code: i64,
        message: String,
    },
    #[error("tool-server closed before answering '{method}' (id={id})")]
    Closed { method: String, id: u64 },
    #[error("RPC timeout for method '{method}' (id={id}) after {secs}s")]
    Timeout { method: String, id: u64, secs: u64 },
    #[error("unexpected result for '{method}': {source}")]
    InvalidResult {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("tool-server process not running")]
    NotRunning,
}

/// Failures of a full SDK generation run.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("failed to write declarations to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
