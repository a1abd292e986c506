use coda_core::{CodaError, CodaResult, ToolResult};
use coda_tools::{Tool, ToolSpec};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Progress of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    Pending,
    /// Being worked on. At most one task at a time.
    InProgress,
    /// Done.
    Completed,
}

impl TaskStatus {
    fn marker(self) -> &'static str {
        match self {
            Self::Pending => "[ ]",
            Self::InProgress => "[~]",
            Self::Completed => "[x]",
        }
    }
}

/// A task as the model writes it: imperative `content`, present-continuous
/// `activeForm` shown while the task is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Imperative description, e.g. "Run tests".
    pub content: String,
    /// Current progress.
    pub status: TaskStatus,
    /// Present-continuous form, e.g. "Running tests".
    #[serde(rename = "activeForm")]
    pub active_form: String,
}

impl Task {
    /// A pending task.
    pub fn new(content: impl Into<String>, active_form: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: TaskStatus::Pending,
            active_form: active_form.into(),
        }
    }

    /// Sets the status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }
}

/// Counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TodoSummary {
    /// Tasks not started.
    pub pending: usize,
    /// Tasks being worked on.
    pub in_progress: usize,
    /// Finished tasks.
    pub completed: usize,
}

impl TodoSummary {
    /// All tasks.
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed
    }
}

impl fmt::Display for TodoSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tasks ({} pending, {} in progress, {} completed)",
            self.total(),
            self.pending,
            self.in_progress,
            self.completed
        )
    }
}

/// Shared task list. Clones point at the same list, so the write and list
/// tools observe each other's updates.
#[derive(Debug, Clone, Default)]
pub struct TodoList {
    tasks: Arc<Mutex<Vec<Task>>>,
}

impl TodoList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list. At most one task may be `in_progress`.
    pub fn replace(&self, tasks: Vec<Task>) -> CodaResult<TodoSummary> {
        let in_progress = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count();
        if in_progress > 1 {
            return Err(CodaError::Tool(format!(
                "{in_progress} tasks are in_progress; at most one is allowed"
            )));
        }
        if let Some(idx) = tasks.iter().position(|t| t.content.trim().is_empty()) {
            return Err(CodaError::Tool(format!("Task {} has empty content", idx + 1)));
        }

        *self.tasks.lock() = tasks;
        Ok(self.summary())
    }

    /// A snapshot of the current tasks.
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    /// Whether the list has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Counts per status.
    pub fn summary(&self) -> TodoSummary {
        self.tasks
            .lock()
            .iter()
            .fold(TodoSummary::default(), |mut acc, task| {
                match task.status {
                    TaskStatus::Pending => acc.pending += 1,
                    TaskStatus::InProgress => acc.in_progress += 1,
                    TaskStatus::Completed => acc.completed += 1,
                }
                acc
            })
    }

    /// One line per task; the running task shows its `activeForm`.
    pub fn render(&self) -> String {
        self.tasks
            .lock()
            .iter()
            .enumerate()
            .map(|(i, task)| {
                let text = match task.status {
                    TaskStatus::InProgress => &task.active_form,
                    _ => &task.content,
                };
                format!("{}. {} {text}", i + 1, task.status.marker())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Deserialize)]
struct TodoWriteArgs {
    todos: Vec<Task>,
}

/// Replaces the shared todo list.
pub struct TodoWriteTool {
    spec: ToolSpec,
    list: TodoList,
}

impl TodoWriteTool {
    /// Writes into `list`.
    pub fn new(list: TodoList) -> Self {
        Self {
            spec: ToolSpec::new(
                "todo_write",
                "Create or update the task list for multi-step work. Send the full list each \
                 time. Status is pending, in_progress or completed; keep at most one task \
                 in_progress and mark tasks completed as soon as they are done.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "todos": {
                            "type": "array",
                            "description": "The complete task list",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "content": { "type": "string" },
                                    "status": {
                                        "type": "string",
                                        "enum": ["pending", "in_progress", "completed"]
                                    },
                                    "activeForm": { "type": "string" }
                                },
                                "required": ["content", "status", "activeForm"]
                            }
                        }
                    },
                    "required": ["todos"]
                }),
            ),
            list,
        }
    }
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: serde_json::Value) -> CodaResult<ToolResult> {
        let args: TodoWriteArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return Ok(ToolResult::failure(format!("Invalid todos: {e}"))),
        };

        match self.list.replace(args.todos) {
            Ok(summary) => {
                info!(total = summary.total(), in_progress = summary.in_progress, "Todo list updated");
                Ok(ToolResult::success(format!(
                    "Updated todo list: {summary}\n{}",
                    self.list.render()
                )))
            }
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}

/// Shows the shared todo list.
pub struct TodoListTool {
    spec: ToolSpec,
    list: TodoList,
}

impl TodoListTool {
    /// Reads from `list`.
    pub fn new(list: TodoList) -> Self {
        Self {
            spec: ToolSpec::new(
                "todo_list",
                "View the current task list and its progress.",
                serde_json::json!({ "type": "object", "properties": {} }),
            ),
            list,
        }
    }
}

#[async_trait]
impl Tool for TodoListTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _arguments: serde_json::Value) -> CodaResult<ToolResult> {
        if self.list.is_empty() {
            return Ok(ToolResult::success("No tasks in todo list"));
        }
        Ok(ToolResult::success(format!(
            "Todo list: {}\n{}",
            self.list.summary(),
            self.list.render()
        )))
    }
}
