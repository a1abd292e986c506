use coda_core::{CodaResult, ToolResult};
use coda_tools::{Tool, ToolSpec};
use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::info;

const MAX_WRITE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// System roots the agent may never write below.
const BLOCKED_ROOTS: [&str; 7] = ["/etc/", "/usr/", "/bin/", "/sbin/", "/boot/", "/proc/", "/sys/"];

/// Credential and shell-profile files, matched anywhere in the path.
const BLOCKED_NAMES: [&str; 6] = [".ssh/", ".bashrc", ".zshrc", ".gitconfig", "id_rsa", "id_ed25519"];

pub(crate) fn blocked_write_path(path_str: &str) -> bool {
    let path_lower = path_str.to_lowercase();
    BLOCKED_ROOTS.iter().any(|root| path_lower.starts_with(root))
        || BLOCKED_NAMES.iter().any(|name| path_lower.contains(name))
}

/// File writing tool. Creates or overwrites a file, optionally appending.
pub struct WriteFileTool {
    spec: ToolSpec,
}

impl WriteFileTool {
    /// Creates the `write_file` tool.
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "write_file",
                "Write content to a file, creating it (and its parent directories) if needed.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to the file, absolute or relative to the working directory"
                        },
                        "content": {
                            "type": "string",
                            "description": "Content to write to the file"
                        },
                        "append": {
                            "type": "boolean",
                            "description": "Append to file instead of overwriting (default: false)"
                        },
                        "create_dirs": {
                            "type": "boolean",
                            "description": "Create parent directories if they don't exist (default: true)"
                        }
                    },
                    "required": ["path", "content"]
                }),
            ),
        }
    }
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: serde_json::Value) -> CodaResult<ToolResult> {
        let path_str = arguments["path"].as_str().unwrap_or_default();

        if path_str.is_empty() {
            return Ok(ToolResult::failure("Empty path"));
        }

        let content = arguments["content"].as_str().unwrap_or_default();
        let append = arguments["append"].as_bool().unwrap_or(false);
        let create_dirs = arguments["create_dirs"].as_bool().unwrap_or(true);

        if content.len() > MAX_WRITE_SIZE {
            return Ok(ToolResult::failure(format!(
                "Content too large: {} bytes (max: {MAX_WRITE_SIZE} bytes)",
                content.len()
            )));
        }

        if blocked_write_path(path_str) {
            return Ok(ToolResult::failure(format!(
                "Access denied: '{path_str}' matches blocked pattern"
            )));
        }

        let path = Path::new(path_str);

        if create_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return Ok(ToolResult::failure(format!(
                        "Failed to create directories for '{path_str}': {e}"
                    )));
                }
            }
        }

        let result = if append {
            match tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
            {
                Ok(mut file) => file.write_all(content.as_bytes()).await,
                Err(e) => {
                    return Ok(ToolResult::failure(format!(
                        "Failed to open '{path_str}' for append: {e}"
                    )));
                }
            }
        } else {
            tokio::fs::write(path, content).await
        };

        match result {
            Ok(()) => {
                info!(path = %path_str, size = content.len(), append = append, "File written");
                let response = serde_json::json!({
                    "path": path_str,
                    "bytes_written": content.len(),
                    "append": append,
                });
                Ok(ToolResult::success(response.to_string()))
            }
            Err(e) => Ok(ToolResult::failure(format!(
                "Failed to write '{path_str}': {e}"
            ))),
        }
    }
}
