//! `execute_plan` tool: run the plan script at a workspace path.

use codemode_runtime::{SandboxExecutor, SessionContext};
use codemode_types::{ExecutionResult, ToolDefinition, ToolResponse};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::scope::ScopeBoundary;

pub const EXECUTE_PLAN_TOOL: &str = "execute_plan";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutePlanParams {
    pub plan_path: String,
    #[serde(default)]
    pub dry_run: bool,
}

/// The gateway in front of the sandbox: validates a plan path, reads the
/// plan, runs it and renders a report.
pub struct ExecutePlanTool {
    boundary: ScopeBoundary,
    sandbox: SandboxExecutor,
    definition: ToolDefinition,
}

impl ExecutePlanTool {
    pub fn new(boundary: ScopeBoundary, sandbox: SandboxExecutor) -> Self {
        let definition = ToolDefinition {
            name: EXECUTE_PLAN_TOOL.to_string(),
            description: "Execute a Code Mode plan (a Lua script) from a file. The plan can orchestrate multiple tool calls through the `tools` table.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "planPath": {
                        "type": "string",
                        "description": "Path to the plan file, relative to the workspace root (must be within sessions/<id>/.../artifacts/)."
                    },
                    "dryRun": {
                        "type": "boolean",
                        "description": "If true, only checks that the plan compiles; nothing is executed."
                    }
                },
                "required": ["planPath"]
            }),
        };
        Self {
            boundary,
            sandbox,
            definition,
        }
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Tool-call entry point for a host agent framework.
    ///
    /// Path and parameter problems are returned as `Err` before anything
    /// runs; everything that happens inside the sandbox comes back as a
    /// report with `is_error` set accordingly.
    pub async fn handle_tool_call(&self, params: Value) -> Result<ToolResponse, GatewayError> {
        let params: ExecutePlanParams = serde_json::from_value(params)
            .map_err(|e| GatewayError::InvalidParams(e.to_string()))?;
        let result = self.execute(&params).await?;
        Ok(ToolResponse::text(format_report(&result), !result.success))
    }

    /// Validate, read and run (or compile-check) one plan.
    pub async fn execute(&self, params: &ExecutePlanParams) -> Result<ExecutionResult, GatewayError> {
        let resolved = match self.boundary.validate(&params.plan_path) {
            Ok(path) => path,
            Err(e) => {
                warn!(plan = %params.plan_path, error = %e, "Plan rejected");
                return Err(e);
            }
        };

        let script = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|source| GatewayError::Read {
                path: params.plan_path.clone(),
                source,
            })?;
        let session_id = self.boundary.session_id(&resolved);
        info!(
            plan = %params.plan_path,
            session = %session_id,
            dry_run = params.dry_run,
            "Executing plan"
        );

        if params.dry_run {
            return Ok(self.dry_run(&params.plan_path, &script));
        }

        let mut context = SessionContext::new();
        context.insert("scriptPath".into(), Value::String(params.plan_path.clone()));
        context.insert("sessionId".into(), Value::String(session_id));
        let report = self.sandbox.run(&script, context).await;
        info!(
            plan = %params.plan_path,
            state = ?report.state,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Plan finished"
        );
        Ok(report.result)
    }

    fn dry_run(&self, plan_path: &str, script: &str) -> ExecutionResult {
        match self.sandbox.check(script) {
            Ok(()) => ExecutionResult::succeeded(
                None,
                vec![format!("[DryRun] {plan_path} compiled without executing")],
            ),
            Err(e) => ExecutionResult::failed(e.to_string(), Vec::new()),
        }
    }
}

/// Banner, log transcript and (on failure) the error message.
pub fn format_report(result: &ExecutionResult) -> String {
    let banner = if result.success { "Succeeded" } else { "Failed" };
    let error = result
        .error
        .as_deref()
        .map(|e| format!("ERROR:\n{e}"))
        .unwrap_or_default();
    format!(
        "Plan Execution {banner}.\n\nLOGS:\n{}\n\n{error}",
        result.logs.join("\n")
    )
}
