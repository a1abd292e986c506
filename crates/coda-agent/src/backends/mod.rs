/// Anthropic Messages API.
pub mod claude;
/// OpenAI-compatible chat completions (OpenAI, OpenRouter, Groq).
pub mod openai;
mod sse;

use crate::stream::DeltaStream;
use coda_core::{CodaResult, Message};
use coda_tools::ToolSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-request generation settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnOptions {
    /// Completion token limit.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

/// What a provider's active model can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Streams its replies.
    pub streaming: bool,
    /// Accepts tool definitions.
    pub function_calling: bool,
    /// Accepts image input.
    pub vision: bool,
    /// Default completion limit.
    pub max_tokens: u32,
}

/// Trait for LLM provider adapters.
///
/// An adapter translates the universal history and tool list into one
/// vendor's request format and that vendor's streamed reply into
/// [`StreamDelta`](crate::stream::StreamDelta)s. It knows nothing about the
/// orchestration loop and keeps no conversation state.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `ProviderAdapter` for your struct
/// 3. Add the variant to `ProviderKind` in `config.rs`
/// 4. Wire it up in `ProviderRegistry::from_configs()`
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier of this provider instance.
    fn id(&self) -> &str;

    /// Checks credentials and settles the active model.
    async fn initialize(&mut self) -> CodaResult<()>;

    /// Starts one streamed completion over the full history.
    ///
    /// Transport failures before the first byte are returned as `Err`;
    /// failures after that arrive as an `Error` delta.
    async fn stream_turn(
        &self,
        history: &[Message],
        tools: &[ToolSpec],
        options: &TurnOptions,
    ) -> CodaResult<DeltaStream>;

    /// Models this adapter can serve.
    fn list_models(&self) -> Vec<String>;

    /// Makes `model` the one used by subsequent requests.
    fn select_model(&mut self, model: &str) -> CodaResult<()>;

    /// The model used by the next request.
    fn current_model(&self) -> &str;

    /// What the current model supports.
    fn capabilities(&self) -> Capabilities;

    /// Whether this adapter serves `model`.
    fn claims_model(&self, model: &str) -> bool {
        self.list_models().iter().any(|m| m == model)
    }
}
