//! Built-in tools for the Coda coding agent.
//!
//! Shell execution, file reading, writing and editing, plus a shared todo
//! list the model uses to track multi-step work.
//!
//! [`register_builtins()`] wires the full set into a [`ToolDispatchTable`].

/// In-place exact string replacement.
pub mod file_edit;
/// File read tool.
pub mod file_read;
/// File write tool.
pub mod file_write;
/// Shell command execution tool.
pub mod shell;
/// Shared task list and its write/list tools.
pub mod todo;

pub use file_edit::EditFileTool;
pub use file_read::ReadFileTool;
pub use file_write::WriteFileTool;
pub use shell::BashTool;
pub use todo::{Task, TaskStatus, TodoList, TodoListTool, TodoSummary, TodoWriteTool};

use coda_tools::ToolDispatchTable;
use std::sync::Arc;

/// Register every built-in tool. Both todo tools share `todos`.
pub fn register_builtins(table: &mut ToolDispatchTable, todos: TodoList) {
    table.register(Arc::new(BashTool::new()));
    table.register(Arc::new(ReadFileTool::new()));
    table.register(Arc::new(WriteFileTool::new()));
    table.register(Arc::new(EditFileTool::new()));
    table.register(Arc::new(TodoWriteTool::new(todos.clone())));
    table.register(Arc::new(TodoListTool::new(todos)));
}
