//! Core types and error definitions for the Coda coding agent.
//!
//! This crate provides the foundational types shared across all Coda crates:
//! the provider-agnostic conversation model, tool call abstractions, and the
//! unified error type.
//!
//! # Main types
//!
//! - [`CodaError`] — Unified error enum for all Coda subsystems.
//! - [`CodaResult`] — Convenience alias for `Result<T, CodaError>`.
//! - [`Role`] — Message role (system, user, assistant, tool).
//! - [`Message`] — A single entry of the conversation history.
//! - [`History`] — Append-only history that enforces tool-call pairing.
//! - [`ToolCallRequest`] — An LLM-initiated tool invocation with raw JSON arguments.
//! - [`ToolResult`] — The normalized outcome of executing a tool call.

/// Unified error type.
pub mod error;
/// Append-only conversation history.
pub mod history;
/// Conversation messages.
pub mod message;
/// Tool call requests and results.
pub mod tool;

pub use error::{CodaError, CodaResult};
pub use history::History;
pub use message::{Message, Role};
pub use tool::{ToolCallRequest, ToolResult};
