use std::time::Duration;

use thiserror::Error;

/// Why a script run did not succeed.
///
/// The `Display` text of each variant is what lands in
/// `ExecutionResult::error`.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The interpreter could not be prepared for the run.
    #[error("sandbox setup failed: {0}")]
    Setup(String),

    /// The script failed to compile or raised an error.
    #[error("{0}")]
    Script(String),

    #[error("Script execution timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    /// The worker driving the script went away (panic or cancellation).
    #[error("script worker aborted: {0}")]
    Aborted(String),
}

impl From<mlua::Error> for SandboxError {
    fn from(e: mlua::Error) -> Self {
        SandboxError::Setup(e.to_string())
    }
}
