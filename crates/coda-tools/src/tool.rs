use coda_core::{CodaResult, ToolResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Metadata describing a tool's interface, as sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Name the model calls the tool by.
    pub name: String,
    /// Shown to the model to decide when to call.
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters_schema: serde_json::Value,
}

impl ToolSpec {
    /// Creates a spec from its parts.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
        }
    }
}

/// Trait that all tools implement.
///
/// Implementations may return `Err` (or even panic) freely; the dispatch
/// table normalizes both into failed [`ToolResult`]s.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The interface advertised to the model.
    fn spec(&self) -> &ToolSpec;

    /// Runs the tool on already validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> CodaResult<ToolResult>;
}

/// Adapts a plain async closure into a [`Tool`].
pub struct FnTool<F> {
    spec: ToolSpec,
    handler: F,
}

impl<F> FnTool<F> {
    /// Wraps `handler` under `spec`.
    pub fn new(spec: ToolSpec, handler: F) -> Self {
        Self { spec, handler }
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = CodaResult<ToolResult>> + Send,
{
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: serde_json::Value) -> CodaResult<ToolResult> {
        (self.handler)(arguments).await
    }
}
