use coda_core::ToolCallRequest;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// One vendor-neutral unit of a streamed provider response.
///
/// Adapters translate their wire events into these; the
/// [`StreamReassembler`](crate::reassembler::StreamReassembler) folds them
/// into a [`Turn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamDelta {
    /// A chunk of assistant text.
    Content {
        /// Text to append.
        text: String,
    },

    /// A piece of one tool call, addressed by its position in the turn.
    ToolCallFragment(ToolCallFragment),

    /// The provider finished the turn.
    Done {
        /// Vendor finish reason, e.g. `stop` or `tool_use`.
        reason: String,
    },

    /// The provider reported a failure mid-stream.
    Error {
        /// Vendor error text.
        message: String,
    },
}

impl StreamDelta {
    /// A text delta.
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    /// The end-of-turn delta.
    pub fn done(reason: impl Into<String>) -> Self {
        Self::Done {
            reason: reason.into(),
        }
    }

    /// A mid-stream failure.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Partial tool call data. `id_part` and `name_part` arrive whole, usually on
/// the first fragment for an index; `arguments_part` is a slice of the JSON
/// argument string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    /// Position of the call within the turn.
    pub index: usize,
    /// Provider-assigned call id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_part: Option<String>,
    /// Tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_part: Option<String>,
    /// Next slice of the argument JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments_part: Option<String>,
}

impl ToolCallFragment {
    /// The opening fragment of a call, carrying its id and name.
    pub fn start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id_part: Some(id.into()),
            name_part: Some(name.into()),
            arguments_part: None,
        }
    }

    /// A fragment carrying only a slice of the argument JSON.
    pub fn arguments(index: usize, part: impl Into<String>) -> Self {
        Self {
            index,
            arguments_part: Some(part.into()),
            ..Self::default()
        }
    }
}

/// The stream of deltas returned by a provider for one request.
pub type DeltaStream = Pin<Box<dyn Stream<Item = StreamDelta> + Send>>;

/// The reassembled product of one streamed request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// All assistant text, concatenated.
    pub content: String,
    /// Completed calls in index order.
    pub tool_calls: Vec<ToolCallRequest>,
    /// Reason reported with `Done`, if the stream sent one.
    pub finish_reason: Option<String>,
}

impl Turn {
    /// Whether the turn asks for tools.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
