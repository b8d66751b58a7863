//! The seam between sandboxed scripts and whatever actually performs tool calls.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

/// Performs a named tool call on behalf of a script.
///
/// Implementations forward to a tool-server, a test double, or anything
/// else that can turn `(name, params)` into a JSON value. Errors surface
/// inside the script as raised errors.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool: &str, params: Value) -> anyhow::Result<Value>;
}

/// A [`ToolExecutor`] backed by an async closure.
pub struct FnExecutor<F> {
    func: F,
}

/// Wrap an async closure as a [`ToolExecutor`].
pub fn executor_fn<F, Fut>(func: F) -> FnExecutor<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    FnExecutor { func }
}

#[async_trait]
impl<F, Fut> ToolExecutor for FnExecutor<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn execute(&self, tool: &str, params: Value) -> anyhow::Result<Value> {
        (self.func)(tool.to_string(), params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_executor_fn_receives_name_and_params() {
        let executor = executor_fn(|tool, params| async move {
            Ok(json!({ "tool": tool, "params": params }))
        });

        let out = executor.execute("search", json!({"q": "rust"})).await.unwrap();
        assert_eq!(out, json!({"tool": "search", "params": {"q": "rust"}}));
    }

    #[tokio::test]
    async fn test_executor_fn_propagates_errors() {
        let executor = executor_fn(|tool, _| async move {
            Err::<Value, _>(anyhow::anyhow!("{tool} is unavailable"))
        });

        let err = executor.execute("search", Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "search is unavailable");
    }
}
