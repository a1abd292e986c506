#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Built-in tools dispatched through a `ToolDispatchTable`.

use coda_builtins::{register_builtins, TaskStatus, TodoList};
use coda_core::ToolCallRequest;
use coda_tools::ToolDispatchTable;
use serde_json::json;

fn table_with_builtins() -> (ToolDispatchTable, TodoList) {
    let todos = TodoList::new();
    let mut table = ToolDispatchTable::new();
    register_builtins(&mut table, todos.clone());
    (table, todos)
}

#[test]
fn test_register_builtins_names() {
    let (table, _) = table_with_builtins();
    let names: Vec<String> = table.specs().into_iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        vec!["bash", "edit_file", "read_file", "todo_list", "todo_write", "write_file"]
    );
}

#[tokio::test]
async fn test_write_edit_read_flow() {
    let (table, _) = table_with_builtins();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("src/lib.rs");
    let path = path.to_str().unwrap();

    let written = table
        .dispatch("write_file", json!({"path": path, "content": "pub fn answer() -> u32 { 41 }\n"}))
        .await;
    assert!(written.success, "{:?}", written.error);

    let edited = table
        .dispatch(
            "edit_file",
            json!({"path": path, "old_string": "41", "new_string": "42"}),
        )
        .await;
    assert!(edited.success, "{:?}", edited.error);

    let read = table.dispatch("read_file", json!({"path": path})).await;
    let out: serde_json::Value = serde_json::from_str(read.output.as_deref().unwrap()).unwrap();
    assert_eq!(out["content"], "pub fn answer() -> u32 { 42 }");
}

#[tokio::test]
async fn test_schema_rejects_missing_required_field() {
    let (table, _) = table_with_builtins();
    let result = table.dispatch("edit_file", json!({"path": "x"})).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Missing required field"));

    let result = table.dispatch("bash", json!({"command": 5})).await;
    assert!(result.error.unwrap().contains("expected type 'string'"));
}

#[tokio::test]
async fn test_streamed_call_dispatch() {
    let (table, _) = table_with_builtins();
    let call = ToolCallRequest::new("call_1", "bash", r#"{"command":"printf coda"}"#);
    let result = table.dispatch_call(&call).await;
    assert!(result.success);
    assert!(result.to_content().contains("\"stdout\":\"coda\""));
}

#[tokio::test]
async fn test_todo_tools_share_list_with_caller() {
    let (table, todos) = table_with_builtins();
    let result = table
        .dispatch(
            "todo_write",
            json!({"todos": [
                {"content": "Plan", "status": "completed", "activeForm": "Planning"},
                {"content": "Build", "status": "in_progress", "activeForm": "Building"}
            ]}),
        )
        .await;
    assert!(result.success);

    let tasks = todos.tasks();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1].status, TaskStatus::InProgress);

    let listed = table.dispatch("todo_list", json!({})).await;
    assert!(listed.output.unwrap().contains("2. [~] Building"));
}
