#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

//! Shared fixtures: a scripted provider adapter and small helpers.

use async_trait::async_trait;
use coda_agent::{
    Capabilities, ConversationOrchestrator, DeltaStream, OrchestratorEvent, ProviderAdapter,
    StreamDelta, ToolCallFragment, TurnOptions,
};
use coda_core::{CodaError, CodaResult, Message};
use coda_tools::ToolSpec;
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Emit these deltas, then end the stream.
    Deltas(Vec<StreamDelta>),
    /// Emit these deltas, then never end.
    Stall(Vec<StreamDelta>),
    /// Fail the request before streaming.
    Fail(String),
}

/// Adapter that replays scripted replies and records every history it is
/// sent. When the script runs out, `repeat` (if any) is replayed forever.
pub struct ScriptedAdapter {
    id: String,
    models: Vec<String>,
    model: String,
    script: Mutex<VecDeque<Reply>>,
    repeat: Option<Reply>,
    seen: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedAdapter {
    pub fn new(id: &str, models: &[&str], script: Vec<Reply>) -> Self {
        Self {
            id: id.to_string(),
            models: models.iter().map(|m| (*m).to_string()).collect(),
            model: models.first().map(|m| (*m).to_string()).unwrap_or_default(),
            script: Mutex::new(script.into()),
            repeat: None,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn repeating(mut self, reply: Reply) -> Self {
        self.repeat = Some(reply);
        self
    }

    /// Handle to the histories this adapter has received.
    pub fn seen(&self) -> Arc<Mutex<Vec<Vec<Message>>>> {
        self.seen.clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn initialize(&mut self) -> CodaResult<()> {
        Ok(())
    }

    async fn stream_turn(
        &self,
        history: &[Message],
        _tools: &[ToolSpec],
        _options: &TurnOptions,
    ) -> CodaResult<DeltaStream> {
        self.seen.lock().unwrap().push(history.to_vec());

        let next = self.script.lock().unwrap().pop_front();
        let reply = next
            .or_else(|| self.repeat.clone())
            .ok_or_else(|| CodaError::Provider("script exhausted".into()))?;

        match reply {
            Reply::Deltas(deltas) => Ok(Box::pin(stream::iter(deltas))),
            Reply::Stall(deltas) => Ok(Box::pin(stream::iter(deltas).chain(stream::pending()))),
            Reply::Fail(message) => Err(CodaError::Http(message)),
        }
    }

    fn list_models(&self) -> Vec<String> {
        self.models.clone()
    }

    fn select_model(&mut self, model: &str) -> CodaResult<()> {
        if !self.claims_model(model) {
            return Err(CodaError::ModelNotRecognized(model.to_string()));
        }
        self.model = model.to_string();
        Ok(())
    }

    fn current_model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            function_calling: true,
            vision: false,
            max_tokens: 4096,
        }
    }
}

/// A complete turn requesting the given `(id, name, arguments)` calls.
pub fn tool_turn(text: &str, calls: &[(&str, &str, &str)]) -> Reply {
    let mut deltas = Vec::new();
    if !text.is_empty() {
        deltas.push(StreamDelta::content(text));
    }
    for (index, (id, name, args)) in calls.iter().enumerate() {
        deltas.push(StreamDelta::ToolCallFragment(ToolCallFragment::start(index, *id, *name)));
        // Split the arguments so the reassembler has work to do.
        let mid = args.len() / 2;
        deltas.push(StreamDelta::ToolCallFragment(ToolCallFragment::arguments(index, &args[..mid])));
        deltas.push(StreamDelta::ToolCallFragment(ToolCallFragment::arguments(index, &args[mid..])));
    }
    deltas.push(StreamDelta::done("tool_calls"));
    Reply::Deltas(deltas)
}

/// A complete text-only turn.
pub fn text_turn(text: &str) -> Reply {
    Reply::Deltas(vec![StreamDelta::content(text), StreamDelta::done("stop")])
}

/// Runs one submission to completion and collects its events.
pub async fn run(
    orchestrator: &mut ConversationOrchestrator,
    text: &str,
    cancel: CancellationToken,
) -> Vec<OrchestratorEvent> {
    orchestrator.submit_user_message(text, cancel).collect().await
}

/// Event kinds without payloads, for ordering assertions.
pub fn kinds(events: &[OrchestratorEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|e| match e {
            OrchestratorEvent::Content { .. } => "content",
            OrchestratorEvent::ToolCallsDetected { .. } => "tool_calls",
            OrchestratorEvent::ToolResult { .. } => "tool_result",
            OrchestratorEvent::TokenUsage { .. } => "tokens",
            OrchestratorEvent::RoundLimitReached { .. } => "round_limit",
            OrchestratorEvent::Done => "done",
            OrchestratorEvent::Error { .. } => "error",
            OrchestratorEvent::Cancelled => "cancelled",
        })
        .collect()
}
