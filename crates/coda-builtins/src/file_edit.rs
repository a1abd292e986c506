use crate::file_write::blocked_write_path;
use coda_core::{CodaResult, ToolResult};
use coda_tools::{Tool, ToolSpec};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// In-place text replacement. Without `replace_all`, `old_string` must occur
/// exactly once so the edit is unambiguous.
pub struct EditFileTool {
    spec: ToolSpec,
}

impl EditFileTool {
    /// Creates the `edit_file` tool.
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "edit_file",
                "Replace an exact string in a file. old_string must be unique unless replace_all is set.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to the file to edit"
                        },
                        "old_string": {
                            "type": "string",
                            "description": "Exact text to replace"
                        },
                        "new_string": {
                            "type": "string",
                            "description": "Replacement text"
                        },
                        "replace_all": {
                            "type": "boolean",
                            "description": "Replace every occurrence (default: false)"
                        }
                    },
                    "required": ["path", "old_string", "new_string"]
                }),
            ),
        }
    }
}

impl Default for EditFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: serde_json::Value) -> CodaResult<ToolResult> {
        let path_str = arguments["path"].as_str().unwrap_or_default();
        let old_string = arguments["old_string"].as_str().unwrap_or_default();
        let new_string = arguments["new_string"].as_str().unwrap_or_default();
        let replace_all = arguments["replace_all"].as_bool().unwrap_or(false);

        if path_str.is_empty() {
            return Ok(ToolResult::failure("Empty path"));
        }
        if old_string.is_empty() {
            return Ok(ToolResult::failure("old_string must not be empty"));
        }
        if old_string == new_string {
            return Ok(ToolResult::failure(
                "old_string and new_string are identical",
            ));
        }
        if blocked_write_path(path_str) {
            return Ok(ToolResult::failure(format!(
                "Access denied: '{path_str}' matches blocked pattern"
            )));
        }

        let path = Path::new(path_str);
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => {
                return Ok(ToolResult::failure(format!("Failed to read '{path_str}': {e}")));
            }
        };

        let occurrences = content.matches(old_string).count();
        if occurrences == 0 {
            return Ok(ToolResult::failure(format!(
                "old_string not found in '{path_str}'"
            )));
        }
        if occurrences > 1 && !replace_all {
            return Ok(ToolResult::failure(format!(
                "old_string occurs {occurrences} times in '{path_str}'; \
                 add more context or set replace_all"
            )));
        }

        let updated = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };

        if let Err(e) = tokio::fs::write(path, &updated).await {
            return Ok(ToolResult::failure(format!("Failed to write '{path_str}': {e}")));
        }

        info!(path = %path_str, replacements = occurrences, "File edited");
        let response = serde_json::json!({
            "path": path_str,
            "replacements": occurrences,
        });
        Ok(ToolResult::success(response.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn fixture(body: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.rs");
        tokio::fs::write(&file, body).await.unwrap();
        let path = file.to_str().unwrap().to_string();
        (dir, path)
    }

    #[tokio::test]
    async fn test_edit_single_occurrence() {
        let (_dir, path) = fixture("fn main() {\n    println!(\"hi\");\n}\n").await;
        let tool = EditFileTool::new();
        let result = tool
            .execute(json!({"path": path, "old_string": "\"hi\"", "new_string": "\"hello\""}))
            .await
            .unwrap();
        assert!(result.success, "Result: {:?}", result.error);
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "fn main() {\n    println!(\"hello\");\n}\n"
        );
    }

    #[tokio::test]
    async fn test_edit_ambiguous_without_replace_all() {
        let (_dir, path) = fixture("a a a").await;
        let tool = EditFileTool::new();
        let result = tool
            .execute(json!({"path": path, "old_string": "a", "new_string": "b"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("occurs 3 times"));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "a a a");
    }

    #[tokio::test]
    async fn test_edit_replace_all() {
        let (_dir, path) = fixture("a a a").await;
        let tool = EditFileTool::new();
        let result = tool
            .execute(json!({
                "path": path,
                "old_string": "a",
                "new_string": "b",
                "replace_all": true
            }))
            .await
            .unwrap();
        let out: serde_json::Value =
            serde_json::from_str(result.output.as_deref().unwrap()).unwrap();
        assert_eq!(out["replacements"], 3);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "b b b");
    }

    #[tokio::test]
    async fn test_edit_not_found() {
        let (_dir, path) = fixture("hello").await;
        let tool = EditFileTool::new();
        let result = tool
            .execute(json!({"path": path, "old_string": "bye", "new_string": "x"}))
            .await
            .unwrap();
        assert!(result.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_edit_rejects_noop_and_empty() {
        let (_dir, path) = fixture("hello").await;
        let tool = EditFileTool::new();
        let same = tool
            .execute(json!({"path": path, "old_string": "hello", "new_string": "hello"}))
            .await
            .unwrap();
        assert!(!same.success);

        let empty = tool
            .execute(json!({"path": path, "old_string": "", "new_string": "x"}))
            .await
            .unwrap();
        assert!(!empty.success);
    }

    #[tokio::test]
    async fn test_edit_blocked_path() {
        let tool = EditFileTool::new();
        let result = tool
            .execute(json!({"path": "/etc/hosts", "old_string": "a", "new_string": "b"}))
            .await
            .unwrap();
        assert!(result.error.unwrap().contains("blocked"));
    }
}
