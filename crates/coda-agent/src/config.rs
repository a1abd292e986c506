use coda_core::{CodaError, CodaResult};
use serde::{Deserialize, Serialize};

/// Wire protocol family of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions.
    OpenAi,
    /// OpenRouter, OpenAI-compatible with attribution headers.
    OpenRouter,
    /// Groq cloud inference, OpenAI-compatible API.
    Groq,
    /// Anthropic Messages API.
    Claude,
}

impl ProviderKind {
    /// Endpoint root used when none is configured.
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::OpenRouter => "https://openrouter.ai/api",
            ProviderKind::Groq => "https://api.groq.com/openai",
            ProviderKind::Claude => "https://api.anthropic.com",
        }
    }

    /// Environment variable consulted when no key is configured.
    pub fn default_api_key_env(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::Claude => "ANTHROPIC_API_KEY",
        }
    }

    /// Models offered when the configuration lists none.
    pub fn default_models(self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAi => &["gpt-4o", "gpt-4o-mini"],
            ProviderKind::OpenRouter => &["anthropic/claude-sonnet-4", "openai/gpt-4o"],
            ProviderKind::Groq => &["llama-3.3-70b-versatile", "moonshotai/kimi-k2-instruct"],
            ProviderKind::Claude => &["claude-sonnet-4-20250514", "claude-3-5-haiku-20241022"],
        }
    }
}

/// One configured provider endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name used to select this provider.
    pub id: String,
    /// Selects the adapter.
    pub kind: ProviderKind,
    /// Inline key. Prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Overrides the kind's default endpoint.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Models offered by this provider.
    #[serde(default)]
    pub models: Vec<String>,
    /// Model active after startup.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Completion token limit per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_max_tokens() -> u32 {
    4096
}

impl ProviderConfig {
    /// A config with no key, default endpoint and default models.
    pub fn new(id: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            id: id.into(),
            kind,
            api_key: None,
            api_key_env: None,
            api_base_url: None,
            models: Vec::new(),
            default_model: None,
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }

    /// Endpoint root without a trailing slash.
    pub fn base_url(&self) -> &str {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/'),
            None => self.kind.default_base_url(),
        }
    }

    /// The configured key, else the named (or default) environment variable.
    pub fn resolve_api_key(&self) -> CodaResult<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        let var = self
            .api_key_env
            .as_deref()
            .unwrap_or_else(|| self.kind.default_api_key_env());
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(CodaError::Config(format!(
                "No API key for provider '{}': set api_key or {var}",
                self.id
            ))),
        }
    }

    /// Configured models, falling back to the default model and then to the
    /// kind's defaults.
    pub fn model_list(&self) -> Vec<String> {
        if !self.models.is_empty() {
            let mut models = self.models.clone();
            if let Some(default) = &self.default_model {
                if !models.contains(default) {
                    models.insert(0, default.clone());
                }
            }
            return models;
        }
        if let Some(default) = &self.default_model {
            return vec![default.clone()];
        }
        self.kind
            .default_models()
            .iter()
            .map(|m| (*m).to_string())
            .collect()
    }

    /// The model selected at startup.
    pub fn initial_model(&self) -> String {
        self.default_model
            .clone()
            .or_else(|| self.model_list().into_iter().next())
            .unwrap_or_default()
    }
}

/// Orchestration policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool rounds allowed per submission.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Seeds every new conversation.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Overrides the provider's `max_tokens` when set.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_max_rounds() -> u32 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            system_prompt: None,
            max_tokens: None,
            temperature: None,
        }
    }
}
