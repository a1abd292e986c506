#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Regression tests for coda-agent: ProviderKind, ProviderConfig, AgentConfig, StreamDelta.

use coda_agent::{AgentConfig, ProviderConfig, ProviderKind, ProviderRegistry, StreamDelta, ToolCallFragment};

// --- ProviderKind ---

#[test]
fn test_provider_kind_serialization() {
    for (kind, name) in [
        (ProviderKind::OpenAi, "\"openai\""),
        (ProviderKind::OpenRouter, "\"openrouter\""),
        (ProviderKind::Groq, "\"groq\""),
        (ProviderKind::Claude, "\"claude\""),
    ] {
        assert_eq!(serde_json::to_string(&kind).unwrap(), name);
        let back: ProviderKind = serde_json::from_str(name).unwrap();
        assert_eq!(back, kind);
    }
}

// --- ProviderConfig from TOML ---

#[test]
fn test_provider_config_toml_defaults() {
    let cfg: ProviderConfig = toml::from_str(
        r#"
        id = "groq"
        kind = "groq"
        api_key_env = "GROQ_API_KEY"
        "#,
    )
    .unwrap();

    assert_eq!(cfg.kind, ProviderKind::Groq);
    assert_eq!(cfg.max_tokens, 4096);
    assert!(cfg.temperature.is_none());
    assert!(cfg.models.is_empty());
    assert_eq!(cfg.base_url(), "https://api.groq.com/openai");
    assert_eq!(cfg.initial_model(), "llama-3.3-70b-versatile");
}

#[test]
fn test_provider_config_toml_full() {
    let cfg: ProviderConfig = toml::from_str(
        r#"
        id = "local"
        kind = "openai"
        api_key = "sk-local"
        api_base_url = "http://localhost:8080"
        models = ["qwen-coder", "llama"]
        default_model = "llama"
        max_tokens = 2048
        temperature = 0.2
        "#,
    )
    .unwrap();

    assert_eq!(cfg.base_url(), "http://localhost:8080");
    assert_eq!(cfg.resolve_api_key().unwrap(), "sk-local");
    assert_eq!(cfg.initial_model(), "llama");
    assert_eq!(cfg.max_tokens, 2048);
    assert_eq!(cfg.temperature, Some(0.2));
}

#[test]
fn test_unknown_provider_kind_rejected() {
    let result: Result<ProviderConfig, _> = toml::from_str(
        r#"
        id = "x"
        kind = "claude_code"
        "#,
    );
    assert!(result.is_err());
}

// --- AgentConfig ---

#[test]
fn test_agent_config_toml_defaults() {
    let cfg: AgentConfig = toml::from_str("").unwrap();
    assert_eq!(cfg.max_rounds, 30);
    assert!(cfg.max_tokens.is_none());

    let cfg: AgentConfig = toml::from_str(
        r#"
        max_rounds = 5
        system_prompt = "Be terse."
        "#,
    )
    .unwrap();
    assert_eq!(cfg.max_rounds, 5);
    assert_eq!(cfg.system_prompt.as_deref(), Some("Be terse."));
}

// --- Registry from configs ---

#[test]
fn test_registry_from_mixed_configs() {
    let configs: Vec<ProviderConfig> = vec![
        toml::from_str("id = \"claude\"\nkind = \"claude\"").unwrap(),
        toml::from_str("id = \"openrouter\"\nkind = \"openrouter\"").unwrap(),
    ];
    let registry = ProviderRegistry::from_configs(&configs);
    assert_eq!(registry.active_id(), Some("claude"));
    assert_eq!(
        registry.resolve("anthropic/claude-sonnet-4").unwrap().id(),
        "openrouter"
    );
}

// --- StreamDelta wire shape ---

#[test]
fn test_stream_delta_tagged_json() {
    let delta = StreamDelta::ToolCallFragment(ToolCallFragment::arguments(2, "{\"a\""));
    let json = serde_json::to_value(&delta).unwrap();
    assert_eq!(json["type"], "tool_call_fragment");
    assert_eq!(json["index"], 2);
    assert!(json.get("name_part").is_none());

    let back: StreamDelta = serde_json::from_value(json).unwrap();
    assert_eq!(back, delta);

    let done: StreamDelta = serde_json::from_str(r#"{"type":"done","reason":"stop"}"#).unwrap();
    assert_eq!(done, StreamDelta::done("stop"));
}
