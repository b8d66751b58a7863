use thiserror::Error;

/// Rejections raised by the invocation gateway before any script runs.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Access denied: Path is outside workspace root")]
    OutsideWorkspace { path: String },

    #[error("Access denied: Plans must be executed from session artifacts directories.")]
    OutsideSessionArtifacts { path: String },

    #[error("Plan file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to read plan {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl GatewayError {
    /// Whether this rejection is an access-control decision rather than a
    /// malformed request or I/O failure.
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            GatewayError::OutsideWorkspace { .. } | GatewayError::OutsideSessionArtifacts { .. }
        )
    }
}
