use crate::schema;
use crate::tool::{FnTool, Tool, ToolSpec};
use coda_core::{CodaResult, ToolCallRequest, ToolResult};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Error text returned for calls to a name nobody registered.
pub const TOOL_NOT_FOUND: &str = "Tool not found";

/// Central table mapping tool names to their implementations.
///
/// `dispatch` never fails: unknown tools, schema violations, handler errors
/// and handler panics all come back as a failed [`ToolResult`] so the model
/// can react to them in its next turn.
pub struct ToolDispatchTable {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolDispatchTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registers a tool under its spec name, replacing any previous entry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name.clone();
        info!(tool = %name, "Registered tool");
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replaced previously registered tool");
        }
    }

    /// Registers an async closure as a tool.
    pub fn register_fn<F, Fut>(&mut self, spec: ToolSpec, handler: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CodaResult<ToolResult>> + Send + 'static,
    {
        self.register(Arc::new(FnTool::new(spec, handler)));
    }

    /// Looks up a registered tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Specs of every registered tool, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec().clone()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Number of registered tools.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Validates and executes a tool by name.
    pub async fn dispatch(&self, name: &str, arguments: serde_json::Value) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "Dispatch to unknown tool");
            return ToolResult::failure(TOOL_NOT_FOUND);
        };

        if let Err(violation) = schema::validate(&tool.spec().parameters_schema, &arguments) {
            debug!(tool = %name, violation = %violation, "Rejected tool arguments");
            return ToolResult::failure(format!("Invalid arguments for '{name}': {violation}"));
        }

        match AssertUnwindSafe(tool.execute(arguments)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                ToolResult::failure(e.to_string())
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(tool = %name, reason = %reason, "Tool panicked");
                ToolResult::failure(format!("Tool '{name}' panicked: {reason}"))
            }
        }
    }

    /// Parses a streamed call's raw arguments and dispatches it.
    pub async fn dispatch_call(&self, call: &ToolCallRequest) -> ToolResult {
        match call.arguments() {
            Ok(arguments) => self.dispatch(&call.name, arguments).await,
            Err(e) => ToolResult::failure(format!("Invalid JSON arguments: {e}")),
        }
    }
}

impl Default for ToolDispatchTable {
    fn default() -> Self {
        Self::new()
    }
}
