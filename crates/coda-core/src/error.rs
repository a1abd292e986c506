use thiserror::Error;

/// Top-level error type for Coda.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum CodaError {
    /// An error originating from the conversation loop.
    #[error("Agent error: {0}")]
    Agent(String),

    /// The provider reported a failure while streaming a turn.
    #[error("Provider error: {0}")]
    Provider(String),

    /// An error from an outbound HTTP request (e.g. LLM API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error raised by a tool implementation.
    #[error("Tool error: {0}")]
    Tool(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// No registered provider serves the requested model.
    #[error("Model not recognized: {0}")]
    ModelNotRecognized(String),

    /// A message would break the conversation history invariants.
    #[error("History error: {0}")]
    History(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`CodaError`].
pub type CodaResult<T> = Result<T, CodaError>;
