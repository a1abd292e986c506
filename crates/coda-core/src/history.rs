use crate::error::{CodaError, CodaResult};
use crate::message::{Message, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Append-only, chronological conversation history.
///
/// `push` rejects messages that would leave the history unreplayable:
/// a tool message must answer a pending call of an earlier assistant message,
/// and no other message may follow while calls are still unanswered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    messages: Vec<Message>,
    #[serde(default)]
    pending: BTreeSet<String>,
}

impl History {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history that starts with a system prompt.
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
            pending: BTreeSet::new(),
        }
    }

    /// Appends a message after checking the history invariants.
    pub fn push(&mut self, message: Message) -> CodaResult<()> {
        if message.content.is_none() && !message.has_tool_calls() {
            return Err(CodaError::History(format!(
                "{} message without content must carry tool calls",
                message.role
            )));
        }

        match message.role {
            Role::Tool => {
                let call_id = message.tool_call_id.as_deref().ok_or_else(|| {
                    CodaError::History("tool message is missing tool_call_id".into())
                })?;
                if !self.pending.remove(call_id) {
                    return Err(CodaError::History(format!(
                        "tool message answers unknown or already answered call '{call_id}'"
                    )));
                }
            }
            _ => {
                if !self.pending.is_empty() {
                    return Err(CodaError::History(format!(
                        "{} message appended while {} tool call(s) are unanswered",
                        message.role,
                        self.pending.len()
                    )));
                }
                if message.role == Role::Assistant {
                    let mut ids = BTreeSet::new();
                    for call in &message.tool_calls {
                        if !ids.insert(call.id.clone()) {
                            return Err(CodaError::History(format!(
                                "duplicate tool call id '{}' in one turn",
                                call.id
                            )));
                        }
                    }
                    self.pending = ids;
                }
            }
        }

        self.messages.push(message);
        Ok(())
    }

    /// All messages in chronological order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Ids of assistant tool calls that have no tool message yet.
    pub fn pending_tool_calls(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Drops the conversation but keeps a leading system prompt.
    pub fn clear(&mut self) {
        let keep = usize::from(
            self.messages
                .first()
                .is_some_and(|m| m.role == Role::System),
        );
        self.messages.truncate(keep);
        self.pending.clear();
    }

    /// Rough token estimation (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.messages
            .iter()
            .map(|m| {
                let calls: usize = m
                    .tool_calls
                    .iter()
                    .map(|c| c.name.len() + c.raw_arguments.len())
                    .sum();
                (m.text().len() + calls) / 4
            })
            .sum()
    }
}
