//! Capability proxy: every tool access made by a script goes through here.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::executor::ToolExecutor;
use crate::log::ScriptLog;

/// Forwards script capability calls to a [`ToolExecutor`], recording each
/// call (and each failure) in the run's [`ScriptLog`].
///
/// The proxy holds no list of known tools: whatever name the script asks
/// for is forwarded as-is.
#[derive(Clone)]
pub struct CapabilityProxy {
    executor: Arc<dyn ToolExecutor>,
    log: ScriptLog,
}

impl CapabilityProxy {
    pub fn new(executor: Arc<dyn ToolExecutor>, log: ScriptLog) -> Self {
        Self { executor, log }
    }

    /// Log `[Call] <name>`, delegate, and on failure log
    /// `[Error] <name>: <message>` before handing the error back.
    pub async fn invoke(&self, name: &str, params: Value) -> anyhow::Result<Value> {
        self.log.push(format!("[Call] {name}"));
        debug!(tool = %name, "Forwarding capability call");

        match self.executor.execute(name, params).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.log.push(format!("[Error] {name}: {e:#}"));
                debug!(tool = %name, error = %e, "Capability call failed");
                Err(e)
            }
        }
    }
}
