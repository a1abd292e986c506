use coda_core::{CodaResult, ToolResult};
use coda_tools::{Tool, ToolSpec};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const DEFAULT_LINE_LIMIT: usize = 2000;

/// File reading tool. Returns a window of lines from a text file.
pub struct ReadFileTool {
    spec: ToolSpec,
}

impl ReadFileTool {
    /// Creates the `read_file` tool.
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "read_file",
                "Read a text file. Use offset/limit to page through large files.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to the file, absolute or relative to the working directory"
                        },
                        "offset": {
                            "type": "integer",
                            "description": "1-based line number to start reading from (default: 1)"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of lines to return (default: 2000)"
                        }
                    },
                    "required": ["path"]
                }),
            ),
        }
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: serde_json::Value) -> CodaResult<ToolResult> {
        let path_str = arguments["path"].as_str().unwrap_or_default();

        if path_str.is_empty() {
            return Ok(ToolResult::failure("Empty path"));
        }

        let path = Path::new(path_str);

        // Resolve symlinks so the blocklist sees the real target.
        let canonical = match tokio::fs::canonicalize(path).await {
            Ok(p) => p,
            Err(e) => {
                return Ok(ToolResult::failure(format!(
                    "Cannot resolve path '{path_str}': {e}"
                )));
            }
        };

        let blocked_patterns = ["/etc/shadow", "/.ssh/", "/.aws/", "/.gnupg/"];
        let canonical_str = canonical.to_string_lossy();
        if blocked_patterns.iter().any(|p| canonical_str.contains(p)) {
            return Ok(ToolResult::failure(format!(
                "Access denied: '{path_str}' matches blocked pattern"
            )));
        }

        let metadata = match tokio::fs::metadata(&canonical).await {
            Ok(m) => m,
            Err(e) => {
                return Ok(ToolResult::failure(format!(
                    "Cannot read metadata for '{path_str}': {e}"
                )));
            }
        };

        if !metadata.is_file() {
            return Ok(ToolResult::failure(format!("'{path_str}' is not a file")));
        }

        if metadata.len() > MAX_FILE_SIZE {
            return Ok(ToolResult::failure(format!(
                "File too large: {} bytes (max: {MAX_FILE_SIZE} bytes)",
                metadata.len()
            )));
        }

        let content = match tokio::fs::read_to_string(&canonical).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Ok(ToolResult::failure(format!(
                    "'{path_str}' is not valid UTF-8 text"
                )));
            }
            Err(e) => {
                return Ok(ToolResult::failure(format!("Failed to read '{path_str}': {e}")));
            }
        };

        let offset = arguments["offset"]
            .as_u64()
            .and_then(|o| usize::try_from(o).ok())
            .unwrap_or(1)
            .max(1);
        let limit = arguments["limit"]
            .as_u64()
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(DEFAULT_LINE_LIMIT);

        let total_lines = content.lines().count();
        let window: Vec<&str> = content.lines().skip(offset - 1).take(limit).collect();
        let end_line = offset - 1 + window.len();

        info!(
            path = %canonical.display(),
            start = offset,
            lines = window.len(),
            "Reading file"
        );

        let response = serde_json::json!({
            "path": canonical_str,
            "total_lines": total_lines,
            "start_line": offset,
            "end_line": end_line,
            "content": window.join("\n"),
        });

        Ok(ToolResult::success(response.to_string()))
    }
}
