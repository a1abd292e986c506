use coda_core::{ToolCallRequest, ToolResult};
use serde::{Deserialize, Serialize};

/// Events yielded to the presentation layer during one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// Assistant text, forwarded as it streams in.
    Content {
        /// The new text.
        text: String,
    },

    /// The turn finished with these tool calls; they run next, in order.
    ToolCallsDetected {
        /// Calls in execution order.
        calls: Vec<ToolCallRequest>,
    },

    /// One call finished and its result was recorded.
    ToolResult {
        /// The call that ran.
        call: ToolCallRequest,
        /// Its outcome, as recorded in history.
        result: ToolResult,
    },

    /// Rough size of the history after a turn, at four characters per token.
    TokenUsage {
        /// Estimated tokens.
        estimated: usize,
    },

    /// The tool round cap was hit; no further provider request is made.
    RoundLimitReached {
        /// The configured cap.
        limit: u32,
    },

    /// The provider answered without requesting tools.
    Done,

    /// A provider failure ended the submission.
    Error {
        /// Human-readable cause.
        message: String,
    },

    /// The caller cancelled the submission.
    Cancelled,
}

impl OrchestratorEvent {
    /// Whether this event ends the submission.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. } | Self::Cancelled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let event = OrchestratorEvent::RoundLimitReached { limit: 30 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "round_limit_reached");
        assert_eq!(json["limit"], 30);

        let json = serde_json::to_value(OrchestratorEvent::Cancelled).unwrap();
        assert_eq!(json, serde_json::json!({"type": "cancelled"}));
    }

    #[test]
    fn test_terminal_events() {
        assert!(OrchestratorEvent::Done.is_terminal());
        assert!(OrchestratorEvent::Cancelled.is_terminal());
        assert!(!OrchestratorEvent::TokenUsage { estimated: 1 }.is_terminal());
    }
}
