//! Streaming conversation orchestration for Coda.
//!
//! Provider adapters normalize vendor streams into [`StreamDelta`]s, the
//! [`StreamReassembler`] folds them into complete turns, and the
//! [`ConversationOrchestrator`] runs the tool-call loop over a
//! provider-agnostic [`History`](coda_core::History).

/// Provider adapters and the contract they implement.
pub mod backends;
/// Provider and orchestration settings.
pub mod config;
/// Events yielded to the presentation layer.
pub mod events;
/// The multi-round tool-call loop.
pub mod orchestrator;
/// Incremental reassembly of streamed turns.
pub mod reassembler;
/// Model-to-adapter routing.
pub mod registry;
/// Vendor-neutral stream deltas.
pub mod stream;

pub use backends::claude::ClaudeAdapter;
pub use backends::openai::OpenAiAdapter;
pub use backends::{Capabilities, ProviderAdapter, TurnOptions};
pub use config::{AgentConfig, ProviderConfig, ProviderKind};
pub use events::OrchestratorEvent;
pub use orchestrator::{ConversationOrchestrator, OrchestratorState, CANCELLED_BEFORE_EXECUTION};
pub use reassembler::{reassemble, Progress, StreamReassembler};
pub use registry::ProviderRegistry;
pub use stream::{DeltaStream, StreamDelta, ToolCallFragment, Turn};
