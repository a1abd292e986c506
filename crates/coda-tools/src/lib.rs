//! Tool plumbing for Coda: the [`Tool`] trait, the [`ToolSpec`] schema a tool
//! advertises to the model, and the [`ToolDispatchTable`] that validates and
//! executes calls.

/// Validating dispatch of tool calls.
pub mod registry;
/// Argument validation against a tool's JSON schema.
pub mod schema;
/// The tool trait and its advertised spec.
pub mod tool;

pub use registry::ToolDispatchTable;
pub use tool::{FnTool, Tool, ToolSpec};
