//! Folding a stream of [`StreamDelta`]s into one [`Turn`].
//!
//! Vendors stream a tool call's argument JSON token by token, split at
//! arbitrary points, with several calls interleaved by index. The
//! reassembler buffers fragments per index and releases a call the moment
//! its arguments form one complete JSON object and its name is known.

use crate::stream::{StreamDelta, ToolCallFragment, Turn};
use coda_core::{CodaError, CodaResult, ToolCallRequest};
use futures_util::{Stream, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// What a single accepted delta produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Text to forward to the user.
    Content(String),
    /// A tool call whose arguments just became complete.
    ToolCallReady(ToolCallRequest),
    /// A fragment was buffered; nothing is complete yet.
    Pending,
    /// The provider signalled the end of the turn.
    Finished,
    /// The delta arrived after the turn finished, or for a call that was
    /// already released, and was discarded.
    Ignored,
}

#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    scanner: JsonScanner,
}

/// Incremental state for reassembling one turn.
///
/// A reassembler is single-use: create a fresh one per provider request.
#[derive(Debug, Default)]
pub struct StreamReassembler {
    content: String,
    pending: BTreeMap<usize, PendingCall>,
    completed: Vec<(usize, ToolCallRequest)>,
    released: BTreeSet<usize>,
    finish_reason: Option<String>,
    finished: bool,
}

impl StreamReassembler {
    /// A reassembler for one fresh turn.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one delta. An `Error` delta aborts the turn with
    /// [`CodaError::Provider`].
    pub fn accept(&mut self, delta: StreamDelta) -> CodaResult<Progress> {
        match delta {
            StreamDelta::Error { message } => Err(CodaError::Provider(message)),
            _ if self.finished => {
                debug!(?delta, "Ignoring delta after end of turn");
                Ok(Progress::Ignored)
            }
            StreamDelta::Content { text } => {
                self.content.push_str(&text);
                Ok(Progress::Content(text))
            }
            StreamDelta::ToolCallFragment(fragment) => Ok(self.accept_fragment(fragment)),
            StreamDelta::Done { reason } => {
                self.finish_reason = Some(reason);
                self.finished = true;
                Ok(Progress::Finished)
            }
        }
    }

    fn accept_fragment(&mut self, fragment: ToolCallFragment) -> Progress {
        let index = fragment.index;
        if self.released.contains(&index) {
            debug!(index, "Ignoring fragment for already released tool call");
            return Progress::Ignored;
        }

        let call = self.pending.entry(index).or_default();

        // Ids and names arrive whole; the first non-empty value wins.
        if let Some(id) = fragment.id_part.filter(|s| !s.is_empty()) {
            if call.id.is_none() {
                call.id = Some(id);
            }
        }
        if let Some(name) = fragment.name_part.filter(|s| !s.is_empty()) {
            if call.name.is_none() {
                call.name = Some(name);
            }
        }
        if let Some(part) = fragment.arguments_part {
            call.scanner.feed(&part);
            call.arguments.push_str(&part);
        }

        if call.name.is_none() || !call.scanner.is_balanced() || !parses_as_object(&call.arguments) {
            return Progress::Pending;
        }

        let Some(call) = self.pending.remove(&index) else {
            return Progress::Pending;
        };
        let request = ToolCallRequest {
            id: call
                .id
                .unwrap_or_else(|| format!("call_{index}_{}", uuid::Uuid::new_v4().simple())),
            name: call.name.unwrap_or_default(),
            raw_arguments: call.arguments,
        };
        debug!(index, tool = %request.name, call_id = %request.id, "Tool call complete");
        self.released.insert(index);
        self.completed.push((index, request.clone()));
        Progress::ToolCallReady(request)
    }

    /// Whether a `Done` delta has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Text accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether any tool call has been released so far.
    pub fn has_tool_calls(&self) -> bool {
        !self.completed.is_empty()
    }

    /// Finalizes the turn. Calls whose arguments never completed are dropped
    /// as malformed. Released calls are ordered by stream index.
    pub fn finish(mut self) -> Turn {
        for (index, call) in &self.pending {
            warn!(
                index,
                tool = call.name.as_deref().unwrap_or("<unnamed>"),
                arguments_len = call.arguments.len(),
                "Dropping tool call with incomplete arguments"
            );
        }

        self.completed.sort_by_key(|(index, _)| *index);
        Turn {
            content: self.content,
            tool_calls: self.completed.into_iter().map(|(_, call)| call).collect(),
            finish_reason: self.finish_reason,
        }
    }
}

/// Reassembles a whole delta stream into a [`Turn`].
///
/// Reading stops at the first `Done`; a stream that ends without one is
/// finalized with whatever completed.
pub async fn reassemble<S>(deltas: S) -> CodaResult<Turn>
where
    S: Stream<Item = StreamDelta>,
{
    let mut reassembler = StreamReassembler::new();
    let mut deltas = std::pin::pin!(deltas);
    while let Some(delta) = deltas.next().await {
        if reassembler.accept(delta)? == Progress::Finished {
            break;
        }
    }
    Ok(reassembler.finish())
}

/// Whether `s` is one complete JSON object.
///
/// Brace depth is counted outside string literals (honouring backslash
/// escapes) as a cheap gate; a full parse confirms it.
pub fn is_complete_json(s: &str) -> bool {
    let mut scanner = JsonScanner::default();
    scanner.feed(s);
    scanner.is_balanced() && parses_as_object(s)
}

fn parses_as_object(s: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(s).is_ok_and(|v| v.is_object())
}

/// Brace and string state carried across fragments, so each fragment is
/// scanned once.
#[derive(Debug, Default)]
struct JsonScanner {
    depth: u64,
    opened: bool,
    in_string: bool,
    escaped: bool,
    /// A `}` closed more than was opened; the buffer can never recover.
    broken: bool,
}

impl JsonScanner {
    fn feed(&mut self, part: &str) {
        if self.broken {
            return;
        }
        for ch in part.chars() {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if ch == '\\' {
                    self.escaped = true;
                } else if ch == '"' {
                    self.in_string = false;
                }
                continue;
            }
            match ch {
                '"' => self.in_string = true,
                '{' => {
                    self.depth += 1;
                    self.opened = true;
                }
                '}' => {
                    if self.depth == 0 {
                        self.broken = true;
                        return;
                    }
                    self.depth -= 1;
                }
                _ => {}
            }
        }
    }

    fn is_balanced(&self) -> bool {
        self.opened && self.depth == 0 && !self.in_string && !self.broken
    }
}
