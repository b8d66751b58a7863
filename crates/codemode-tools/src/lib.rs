//! codemode-tools: the `execute_plan` invocation gateway.
//!
//! Provides:
//! - Workspace scoping of plan paths (`sessions/<id>/.../artifacts/`)
//! - The `execute_plan` tool definition and call handler
//! - Report rendering for host agent frameworks

pub mod error;
pub mod execute_plan;
pub mod scope;

pub use error::GatewayError;
pub use execute_plan::{EXECUTE_PLAN_TOOL, ExecutePlanParams, ExecutePlanTool, format_report};
pub use scope::{ScopeBoundary, UNKNOWN_SESSION};
