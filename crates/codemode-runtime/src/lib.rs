//! codemode-runtime: isolated execution of agent-authored scripts.
//!
//! Scripts are Lua chunks. Each run gets a fresh interpreter whose only
//! route to the outside world is the `tools` capability proxy, which
//! forwards every call to a host-supplied [`ToolExecutor`].

pub mod error;
pub mod executor;
mod globals;
pub mod log;
pub mod proxy;
pub mod sandbox;

pub use error::SandboxError;
pub use executor::{FnExecutor, ToolExecutor, executor_fn};
pub use log::ScriptLog;
pub use proxy::CapabilityProxy;
pub use sandbox::{RunReport, RunState, SandboxConfig, SandboxExecutor, SessionContext};
