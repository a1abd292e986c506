use crate::backends::TurnOptions;
use crate::config::AgentConfig;
use crate::events::OrchestratorEvent;
use crate::reassembler::{Progress, StreamReassembler};
use crate::registry::ProviderRegistry;
use crate::stream::{DeltaStream, StreamDelta};
use coda_core::{
    CodaError, CodaResult, History, Message, Role, ToolCallRequest, ToolResult,
};
use coda_tools::ToolDispatchTable;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Recorded as the result of calls skipped because of cancellation.
pub const CANCELLED_BEFORE_EXECUTION: &str = "Cancelled before execution";

/// How long the stream is still read after `Done` for a trailing error.
const TRAILING_ERROR_WINDOW: Duration = Duration::from_millis(250);

/// Next delta, or `None` once `until` passes.
async fn next_delta(deltas: &mut DeltaStream, until: Option<Instant>) -> Option<StreamDelta> {
    match until {
        None => deltas.next().await,
        Some(deadline) => tokio::time::timeout_at(deadline, deltas.next())
            .await
            .ok()
            .flatten(),
    }
}

/// Where the orchestrator is within a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    /// Waiting for user input.
    Idle,
    /// A provider stream is being read.
    AwaitingProviderResponse,
    /// Requested tool calls are running.
    ExecutingTools,
    /// Transient; the orchestrator settles back to `Idle`.
    Cancelled,
}

/// Drives the agentic loop for one conversation.
///
/// User message → provider turn → tool calls → results → provider turn →
/// ... until a turn has no tool calls, the round cap is hit, a provider
/// error occurs, or the submission is cancelled.
pub struct ConversationOrchestrator {
    history: History,
    registry: ProviderRegistry,
    tools: Arc<ToolDispatchTable>,
    options: TurnOptions,
    max_rounds: u32,
    state: OrchestratorState,
    round_counter: u32,
}

impl ConversationOrchestrator {
    /// Starts an empty conversation, seeded with the configured system prompt.
    pub fn new(registry: ProviderRegistry, tools: Arc<ToolDispatchTable>, config: &AgentConfig) -> Self {
        let history = match &config.system_prompt {
            Some(prompt) => History::with_system_prompt(prompt.clone()),
            None => History::new(),
        };
        Self {
            history,
            registry,
            tools,
            options: TurnOptions {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
            max_rounds: config.max_rounds,
            state: OrchestratorState::Idle,
            round_counter: 0,
        }
    }

    /// The conversation so far.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Current state of the loop.
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Tool rounds completed by the current (or last) submission.
    pub fn round_counter(&self) -> u32 {
        self.round_counter
    }

    /// Tool rounds allowed per submission.
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// The providers this conversation can use.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Re-points the active adapter. History is untouched.
    pub fn switch_model(&mut self, model: &str) -> CodaResult<()> {
        self.registry.activate_model(model)
    }

    /// Drops everything but the system prompt.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.round_counter = 0;
    }

    /// Appends `text` as a user message and runs the loop.
    ///
    /// The returned stream is lazy: nothing happens until it is polled. It
    /// ends after a `Done`, `Error` or `Cancelled` event.
    pub fn submit_user_message(
        &mut self,
        text: impl Into<String>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = OrchestratorEvent> + '_ {
        let text = text.into();
        let this = self;

        async_stream::stream! {
            this.settle_abandoned_calls();
            this.round_counter = 0;

            if let Err(e) = this.history.push(Message::user(text)) {
                yield OrchestratorEvent::Error { message: e.to_string() };
                return;
            }

            loop {
                if cancel.is_cancelled() {
                    this.state = OrchestratorState::Cancelled;
                    info!(round = this.round_counter, "Submission cancelled before provider request");
                    yield OrchestratorEvent::Cancelled;
                    this.state = OrchestratorState::Idle;
                    return;
                }

                this.state = OrchestratorState::AwaitingProviderResponse;
                let specs = this.tools.specs();
                let requested = match this.registry.active() {
                    Ok(adapter) => {
                        info!(
                            provider = %adapter.id(),
                            model = %adapter.current_model(),
                            round = this.round_counter,
                            "Requesting provider turn"
                        );
                        adapter
                            .stream_turn(this.history.messages(), &specs, &this.options)
                            .await
                    }
                    Err(e) => Err(e),
                };

                let mut deltas = match requested {
                    Ok(deltas) => deltas,
                    Err(e) => {
                        error!(error = %e, "Provider request failed");
                        yield OrchestratorEvent::Error { message: e.to_string() };
                        this.state = OrchestratorState::Idle;
                        return;
                    }
                };

                let mut reassembler = StreamReassembler::new();
                let mut failure: Option<CodaError> = None;
                let mut cancelled = false;

                // After `Done`, wait briefly for a trailing error, then stop even
                // if the provider leaves the stream open.
                let mut drain_until: Option<Instant> = None;
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            cancelled = drain_until.is_none();
                            break;
                        }
                        next = next_delta(&mut deltas, drain_until) => next,
                    };
                    let Some(delta) = next else { break };

                    match reassembler.accept(delta) {
                        Ok(Progress::Content(text)) => {
                            yield OrchestratorEvent::Content { text };
                        }
                        Ok(Progress::Finished) => {
                            drain_until = Some(Instant::now() + TRAILING_ERROR_WINDOW);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                drop(deltas);

                if cancelled {
                    this.state = OrchestratorState::Cancelled;
                    info!(round = this.round_counter, "Submission cancelled mid-stream");
                    yield OrchestratorEvent::Cancelled;
                    this.state = OrchestratorState::Idle;
                    return;
                }

                if let Some(e) = failure {
                    error!(error = %e, "Provider stream failed");
                    if reassembler.is_finished() && !reassembler.has_tool_calls() {
                        let turn = reassembler.finish();
                        if let Err(push_err) = this.history.push(Message::assistant(turn.content)) {
                            warn!(error = %push_err, "Could not record best-effort reply");
                        }
                    }
                    yield OrchestratorEvent::Error { message: e.to_string() };
                    this.state = OrchestratorState::Idle;
                    return;
                }

                let turn = reassembler.finish();
                debug!(
                    content_len = turn.content.len(),
                    tool_calls = turn.tool_calls.len(),
                    finish_reason = turn.finish_reason.as_deref().unwrap_or("<none>"),
                    "Turn complete"
                );

                if !turn.has_tool_calls() {
                    if let Err(e) = this.history.push(Message::assistant(turn.content)) {
                        yield OrchestratorEvent::Error { message: e.to_string() };
                        this.state = OrchestratorState::Idle;
                        return;
                    }
                    yield OrchestratorEvent::TokenUsage { estimated: this.history.estimated_tokens() };
                    info!(rounds = this.round_counter, "Submission completed");
                    yield OrchestratorEvent::Done;
                    this.state = OrchestratorState::Idle;
                    return;
                }

                let calls = turn.tool_calls;
                if let Err(e) = this
                    .history
                    .push(Message::assistant_with_tools(turn.content, calls.clone()))
                {
                    yield OrchestratorEvent::Error { message: e.to_string() };
                    this.state = OrchestratorState::Idle;
                    return;
                }
                yield OrchestratorEvent::TokenUsage { estimated: this.history.estimated_tokens() };
                yield OrchestratorEvent::ToolCallsDetected { calls: calls.clone() };

                this.state = OrchestratorState::ExecutingTools;
                let mut skipped = false;
                for call in calls {
                    let result = if skipped || cancel.is_cancelled() {
                        skipped = true;
                        debug!(tool = %call.name, call_id = %call.id, "Skipping tool call after cancellation");
                        ToolResult::failure(CANCELLED_BEFORE_EXECUTION)
                    } else {
                        info!(tool = %call.name, call_id = %call.id, "Executing tool call");
                        this.tools.dispatch_call(&call).await
                    };

                    let recorded = Message::tool_result(call.id.clone(), call.name.clone(), &result);
                    if let Err(e) = this.history.push(recorded) {
                        yield OrchestratorEvent::Error { message: e.to_string() };
                        this.state = OrchestratorState::Idle;
                        return;
                    }
                    yield OrchestratorEvent::ToolResult { call, result };
                }

                if skipped {
                    this.state = OrchestratorState::Cancelled;
                    info!(round = this.round_counter, "Submission cancelled between tool calls");
                    yield OrchestratorEvent::Cancelled;
                    this.state = OrchestratorState::Idle;
                    return;
                }

                this.round_counter += 1;
                if this.round_counter >= this.max_rounds {
                    warn!(limit = this.max_rounds, "Tool round limit reached");
                    yield OrchestratorEvent::RoundLimitReached { limit: this.max_rounds };
                    yield OrchestratorEvent::Done;
                    this.state = OrchestratorState::Idle;
                    return;
                }
            }
        }
    }

    /// Answers calls left pending by a submission whose event stream was
    /// dropped before it finished, so the history accepts new messages.
    fn settle_abandoned_calls(&mut self) {
        self.state = OrchestratorState::Idle;
        let pending: Vec<String> = self.history.pending_tool_calls().map(str::to_string).collect();
        if pending.is_empty() {
            return;
        }

        let unanswered: Vec<ToolCallRequest> = self
            .history
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| {
                m.tool_calls
                    .iter()
                    .filter(|c| pending.contains(&c.id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        warn!(count = unanswered.len(), "Settling tool calls from an abandoned submission");
        for call in unanswered {
            let result = ToolResult::failure(CANCELLED_BEFORE_EXECUTION);
            if let Err(e) = self
                .history
                .push(Message::tool_result(call.id, call.name, &result))
            {
                warn!(error = %e, "Could not settle abandoned tool call");
            }
        }
    }
}
