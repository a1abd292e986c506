use coda_core::{CodaResult, ToolResult};
use coda_tools::{Tool, ToolSpec};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_STDOUT: usize = 50_000;
const MAX_STDERR: usize = 10_000;

/// Shell execution tool. Runs `sh -c <command>` in the agent's working
/// directory with a timeout.
pub struct BashTool {
    spec: ToolSpec,
}

impl BashTool {
    /// Creates the `shell` tool.
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "bash",
                "Execute a shell command and return its exit code, stdout and stderr.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "command": {
                            "type": "string",
                            "description": "The shell command to execute"
                        },
                        "timeout_secs": {
                            "type": "integer",
                            "description": "Timeout in seconds (default: 30, max: 300)",
                            "default": DEFAULT_TIMEOUT_SECS
                        }
                    },
                    "required": ["command"]
                }),
            ),
        }
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for BashTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: serde_json::Value) -> CodaResult<ToolResult> {
        let command = arguments["command"].as_str().unwrap_or_default().trim();

        if command.is_empty() {
            return Ok(ToolResult::failure("Empty command"));
        }

        let timeout_secs = arguments["timeout_secs"]
            .as_u64()
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, MAX_TIMEOUT_SECS);

        if let Some(pattern) = dangerous_pattern(command) {
            warn!(command = %command, pattern = %pattern, "Blocked dangerous command");
            return Ok(ToolResult::failure(format!(
                "Command blocked: contains dangerous pattern '{pattern}'"
            )));
        }

        info!(command = %command, timeout = timeout_secs, "Executing shell command");

        let result = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let exit_code = output.status.code().unwrap_or(-1);

                let response = serde_json::json!({
                    "exit_code": exit_code,
                    "stdout": truncate_output(&stdout, MAX_STDOUT),
                    "stderr": truncate_output(&stderr, MAX_STDERR),
                });

                if output.status.success() {
                    Ok(ToolResult::success(response.to_string()))
                } else {
                    Ok(ToolResult::failure(response.to_string()))
                }
            }
            Ok(Err(e)) => Ok(ToolResult::failure(format!(
                "Failed to execute command: {e}"
            ))),
            Err(_) => Ok(ToolResult::failure(format!(
                "Command timed out after {timeout_secs}s"
            ))),
        }
    }
}

/// Returns the first dangerous pattern `command` matches.
fn dangerous_pattern(command: &str) -> Option<&'static str> {
    const CONTAINS: [&str; 5] = [
        "mkfs",
        "dd if=",
        ":(){ :|:& };:",
        "> /dev/sd",
        "chmod -R 777 /",
    ];
    // Only the filesystem root itself, not paths below it.
    const ROOT_WIPES: [&str; 3] = ["rm -rf /", "rm -fr /", "rm -rf --no-preserve-root /"];

    let normalized = command.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(pattern) = CONTAINS.into_iter().find(|p| normalized.contains(p)) {
        return Some(pattern);
    }

    for pattern in ROOT_WIPES {
        for (start, _) in normalized.match_indices(pattern) {
            let rest = &normalized[start + pattern.len()..];
            if rest.is_empty() || rest.starts_with([' ', '*', ';']) {
                return Some(pattern);
            }
        }
    }

    None
}

fn truncate_output(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated, {} total bytes]", &s[..end], s.len())
}
