//! `coda.toml` loading.

use anyhow::Context;
use coda_agent::{AgentConfig, ProviderConfig};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Coda, a coding assistant working in the user's \
    current directory. Use the tools to inspect and change files and to run commands. Keep \
    answers short and show the commands you ran when they matter.";

#[derive(Debug, Deserialize)]
pub struct CodaConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl CodaConfig {
    pub fn parse(source: &str) -> anyhow::Result<Self> {
        let mut config: CodaConfig = toml::from_str(source)?;
        if config.providers.is_empty() {
            anyhow::bail!("No providers configured; add at least one [[providers]] table");
        }
        if config.agent.system_prompt.is_none() {
            config.agent.system_prompt = Some(DEFAULT_SYSTEM_PROMPT.to_string());
        }
        Ok(config)
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::parse(&source).with_context(|| format!("Invalid config file '{}'", path.display()))
    }
}
