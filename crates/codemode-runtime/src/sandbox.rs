//! The sandbox executor: one isolated, time-bounded run per call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use codemode_types::ExecutionResult;
use mlua::{HookTriggers, Lua, LuaSerdeExt};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::SandboxError;
use crate::executor::ToolExecutor;
use crate::globals::{self, strip_traceback};
use crate::log::ScriptLog;
use crate::proxy::CapabilityProxy;

/// Data injected into a script as plain global values.
pub type SessionContext = serde_json::Map<String, Value>;

/// Chunk name used in script error positions (`plan:3: ...`).
const CHUNK_NAME: &str = "=plan";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_INSTRUCTION_INTERVAL: u32 = 1000;

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Wall-clock budget for a whole run.
    pub timeout: Duration,
    /// How many VM instructions run between deadline checks.
    pub instruction_interval: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            instruction_interval: DEFAULT_INSTRUCTION_INTERVAL,
        }
    }
}

/// Lifecycle of a single run. The last three states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Ready,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

/// Terminal state and result of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,
    pub result: ExecutionResult,
    pub elapsed: Duration,
}

/// How long the host waits past the budget for the worker to report.
/// Past this the worker is abandoned and the run reported as timed out.
const JOIN_GRACE: Duration = Duration::from_millis(500);

/// Marks the run expired when the awaiting side goes away, so an
/// abandoned worker stops at its next deadline check.
struct ExpireOnDrop(Arc<AtomicBool>);

impl Drop for ExpireOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Runs untrusted script text against a [`ToolExecutor`].
///
/// Every call to [`SandboxExecutor::execute`] builds a fresh interpreter;
/// nothing survives from one run to the next.
pub struct SandboxExecutor {
    executor: Arc<dyn ToolExecutor>,
    config: SandboxConfig,
}

impl SandboxExecutor {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self::with_config(executor, SandboxConfig::default())
    }

    pub fn with_config(executor: Arc<dyn ToolExecutor>, config: SandboxConfig) -> Self {
        Self { executor, config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run `script` to completion, failure or timeout.
    ///
    /// Never returns an error: every failure is folded into the returned
    /// [`ExecutionResult`] together with the logs collected so far.
    pub async fn execute(&self, script: &str, context: SessionContext) -> ExecutionResult {
        self.run(script, context).await.result
    }

    /// Like [`SandboxExecutor::execute`], also reporting the terminal state.
    ///
    /// The interpreter runs on its own OS thread. If that thread does not
    /// report back within the budget plus a short grace period (a script
    /// stuck inside a library call, for instance) it is abandoned and the
    /// run is reported as timed out. Dropping the returned future marks
    /// the run expired, which stops the worker at its next deadline check.
    pub async fn run(&self, script: &str, context: SessionContext) -> RunReport {
        let log = ScriptLog::new();
        let expired = Arc::new(AtomicBool::new(false));
        let _expire_on_drop = ExpireOnDrop(Arc::clone(&expired));
        let config = self.config.clone();

        let mut state = RunState::Ready;
        debug!(?state, bytes = script.len(), "Preparing script run");
        let started = Instant::now();

        let (tx, rx) = oneshot::channel();
        let worker = {
            let proxy = CapabilityProxy::new(Arc::clone(&self.executor), log.clone());
            let handle = tokio::runtime::Handle::current();
            let script = script.to_owned();
            let log = log.clone();
            let config = config.clone();
            let expired = Arc::clone(&expired);

            // The interpreter is not Send, so it lives and dies on one thread.
            std::thread::Builder::new()
                .name("codemode-sandbox".to_string())
                .spawn(move || {
                    let lua = match globals::prepare(proxy, &log, Arc::clone(&expired), &context) {
                        Ok(lua) => lua,
                        Err(e) => {
                            let _ = tx.send(Err(SandboxError::from(e)));
                            return;
                        }
                    };
                    let outcome = handle.block_on(run_chunk(&lua, &script, &log, &config, &expired));
                    // Report before closing the interpreter.
                    let _ = tx.send(outcome);
                    drop(lua);
                })
        };

        let outcome = match worker {
            Err(e) => Err(SandboxError::Setup(format!("failed to start script worker: {e}"))),
            Ok(_) => {
                state = RunState::Running;
                debug!(?state, timeout_ms = config.timeout.as_millis() as u64, "Script run started");

                match tokio::time::timeout(config.timeout + JOIN_GRACE, rx).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(_)) => Err(SandboxError::Aborted(
                        "script worker exited without a result".to_string(),
                    )),
                    Err(_) => {
                        expired.store(true, Ordering::SeqCst);
                        warn!(
                            timeout_ms = config.timeout.as_millis() as u64,
                            "Script worker unresponsive past its deadline, abandoning it"
                        );
                        Err(SandboxError::TimedOut(config.timeout))
                    }
                }
            }
        };

        let logs = log.snapshot();
        let result = match outcome {
            Ok(value) => {
                state = RunState::Succeeded;
                ExecutionResult::succeeded(value, logs)
            }
            Err(e) => {
                state = if matches!(e, SandboxError::TimedOut(_)) {
                    RunState::TimedOut
                } else {
                    RunState::Failed
                };
                ExecutionResult::failed(e.to_string(), logs)
            }
        };

        let elapsed = started.elapsed();
        info!(
            ?state,
            elapsed_ms = elapsed.as_millis() as u64,
            log_lines = result.logs.len(),
            "Script run finished"
        );
        RunReport {
            state,
            result,
            elapsed,
        }
    }

    /// Compile `script` in a fresh interpreter without running it.
    pub fn check(&self, script: &str) -> Result<(), SandboxError> {
        let lua = globals::bare_state()?;
        lua.load(script)
            .set_name(CHUNK_NAME)
            .into_function()
            .map(|_| ())
            .map_err(|e| SandboxError::Script(error_message(&e)))
    }
}

async fn run_chunk(
    lua: &Lua,
    script: &str,
    log: &ScriptLog,
    config: &SandboxConfig,
    expired: &Arc<AtomicBool>,
) -> Result<Option<Value>, SandboxError> {
    let chunk = lua
        .load(script)
        .set_name(CHUNK_NAME)
        .into_function()
        .map_err(|e| SandboxError::Script(error_message(&e)))?;
    let thread = lua.create_thread(chunk)?;

    let deadline = Instant::now() + config.timeout;
    let flag = Arc::clone(expired);
    thread.set_hook(
        HookTriggers::new().every_nth_instruction(config.instruction_interval.max(1)),
        move |_, _| {
            if flag.load(Ordering::SeqCst) || Instant::now() >= deadline {
                flag.store(true, Ordering::SeqCst);
                return Err(mlua::Error::runtime("script execution timed out"));
            }
            Ok(())
        },
    );

    let outcome = tokio::time::timeout(config.timeout, thread.into_async::<_, mlua::Value>(())).await;

    if expired.load(Ordering::SeqCst) {
        return Err(SandboxError::TimedOut(config.timeout));
    }
    match outcome {
        Err(_) => {
            expired.store(true, Ordering::SeqCst);
            Err(SandboxError::TimedOut(config.timeout))
        }
        Ok(Err(e)) => Err(SandboxError::Script(error_message(&e))),
        Ok(Ok(mlua::Value::Nil)) => Ok(None),
        Ok(Ok(value)) => match lua.from_value::<Value>(value.clone()) {
            Ok(json) => Ok(Some(json)),
            Err(e) => {
                warn!(error = %e, "Script return value is not representable as JSON");
                log.push(format!(
                    "WARN: return value of type {} dropped",
                    value.type_name()
                ));
                Ok(None)
            }
        },
    }
}

/// The message a script author would expect to see for `err`: the raised
/// value itself, without callback wrapping or traceback.
fn error_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => error_message(cause),
        mlua::Error::WithContext { cause, .. } => error_message(cause),
        mlua::Error::RuntimeError(message) => strip_traceback(message),
        mlua::Error::SyntaxError { message, .. } => strip_traceback(message),
        mlua::Error::ExternalError(e) => e.to_string(),
        other => strip_traceback(&other.to_string()),
    }
}
