use super::sse::{spawn_sse_reader, SseTranslator};
use super::{Capabilities, ProviderAdapter, TurnOptions};
use crate::config::{ProviderConfig, ProviderKind};
use crate::stream::{DeltaStream, StreamDelta, ToolCallFragment};
use coda_core::{CodaError, CodaResult, Message, Role};
use coda_tools::ToolSpec;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

/// OpenAI-compatible chat completions adapter.
///
/// Works with OpenAI, OpenRouter, Groq, and any other provider that
/// implements the OpenAI streaming chat completions API.
pub struct OpenAiAdapter {
    config: ProviderConfig,
    model: String,
    http: reqwest::Client,
}

impl OpenAiAdapter {
    /// An adapter for `config`. No network traffic until used.
    pub fn new(config: ProviderConfig) -> Self {
        let model = config.initial_model();
        Self {
            config,
            model,
            http: reqwest::Client::new(),
        }
    }

    fn add_provider_headers(
        &self,
        request: reqwest::RequestBuilder,
        api_key: &str,
    ) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json");

        // OpenRouter requires extra headers
        if matches!(self.config.kind, ProviderKind::OpenRouter) {
            request
                .header("HTTP-Referer", "https://github.com/fboiero/Coda")
                .header("X-Title", "Coda")
        } else {
            request
        }
    }

    fn build_body(&self, history: &[Message], tools: &[ToolSpec], options: &TurnOptions) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": options.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": build_messages(history),
            "stream": true,
        });

        if let Some(temperature) = options.temperature.or(self.config.temperature) {
            body["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            body["tools"] = json!(build_tools(tools));
        }
        body
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn initialize(&mut self) -> CodaResult<()> {
        self.config.resolve_api_key()?;
        if self.model.is_empty() {
            return Err(CodaError::Config(format!(
                "Provider '{}' has no models configured",
                self.config.id
            )));
        }
        info!(provider = %self.config.id, model = %self.model, "Provider initialized");
        Ok(())
    }

    async fn stream_turn(
        &self,
        history: &[Message],
        tools: &[ToolSpec],
        options: &TurnOptions,
    ) -> CodaResult<DeltaStream> {
        let api_key = self.config.resolve_api_key()?;
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let body = self.build_body(history, tools, options);

        debug!(
            provider = %self.config.id,
            model = %self.model,
            messages = history.len(),
            tools = tools.len(),
            "Starting OpenAI-compatible stream"
        );

        let resp = self
            .add_provider_headers(self.http.post(&url), &api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CodaError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(CodaError::Http(format!(
                "OpenAI API error {status}: {error_body}"
            )));
        }

        Ok(spawn_sse_reader(resp, OpenAiStreamTranslator::default()))
    }

    fn list_models(&self) -> Vec<String> {
        self.config.model_list()
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
            vision: !matches!(self.config.kind, ProviderKind::Groq),
            max_tokens: self.config.max_tokens,
        }
    }
}

/// Translates the universal history into chat completions messages.
pub fn build_messages(history: &[Message]) -> Vec<Value> {
    history
        .iter()
        .map(|m| match m.role {
            Role::System => json!({ "role": "system", "content": m.text() }),
            Role::User => json!({ "role": "user", "content": m.text() }),
            Role::Assistant if m.has_tool_calls() => {
                let calls: Vec<Value> = m
                    .tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": { "name": c.name, "arguments": c.raw_arguments },
                        })
                    })
                    .collect();
                json!({ "role": "assistant", "content": m.content, "tool_calls": calls })
            }
            Role::Assistant => json!({ "role": "assistant", "content": m.text() }),
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": m.tool_call_id,
                "content": m.text(),
            }),
        })
        .collect()
}

/// Tool specs as OpenAI `function` entries.
pub fn build_tools(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters_schema,
                }
            })
        })
        .collect()
}

/// Maps chat completion chunks to deltas.
///
/// `Done` is emitted on `[DONE]`, carrying the last `finish_reason` seen.
#[derive(Debug, Default)]
pub struct OpenAiStreamTranslator {
    finish_reason: Option<String>,
    done: bool,
}

impl OpenAiStreamTranslator {
    /// Deltas carried by one SSE `data:` payload.
    pub fn translate(&mut self, data: &str) -> Vec<StreamDelta> {
        if self.done {
            return Vec::new();
        }
        if data == "[DONE]" {
            self.done = true;
            let reason = self.finish_reason.take().unwrap_or_else(|| "stop".into());
            return vec![StreamDelta::done(reason)];
        }

        let event: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Skipping unparsable stream chunk");
                return Vec::new();
            }
        };

        if let Some(error) = event.get("error") {
            self.done = true;
            let message = error["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return vec![StreamDelta::error(message)];
        }

        let mut deltas = Vec::new();
        let choice = &event["choices"][0];
        let delta = &choice["delta"];

        if let Some(content) = delta["content"].as_str() {
            if !content.is_empty() {
                deltas.push(StreamDelta::content(content));
            }
        }

        if let Some(tc_array) = delta["tool_calls"].as_array() {
            for (position, tc) in tc_array.iter().enumerate() {
                let index = tc["index"]
                    .as_u64()
                    .map_or(position, |i| usize::try_from(i).unwrap_or(position));
                deltas.push(StreamDelta::ToolCallFragment(ToolCallFragment {
                    index,
                    id_part: tc["id"].as_str().map(str::to_string),
                    name_part: tc["function"]["name"].as_str().map(str::to_string),
                    arguments_part: tc["function"]["arguments"]
                        .as_str()
                        .filter(|a| !a.is_empty())
                        .map(str::to_string),
                }));
            }
        }

        if let Some(fr) = choice["finish_reason"].as_str() {
            self.finish_reason = Some(fr.to_string());
        }

        deltas
    }
}

impl SseTranslator for OpenAiStreamTranslator {
    fn translate(&mut self, data: &str) -> Vec<StreamDelta> {
        OpenAiStreamTranslator::translate(self, data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use coda_core::ToolCallRequest;

    #[test]
    fn test_build_messages_full_tool_round() {
        let history = vec![
            Message::system("be brief"),
            Message::user("list files"),
            Message::assistant_with_tools(
                "",
                vec![ToolCallRequest::new("call_1", "bash", r#"{"command":"ls"}"#)],
            ),
            Message::tool("call_1", "bash", "a.txt"),
            Message::assistant("There is a.txt"),
        ];
        let msgs = build_messages(&history);
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[2]["role"], "assistant");
        assert!(msgs[2]["content"].is_null());
        assert_eq!(msgs[2]["tool_calls"][0]["function"]["name"], "bash");
        assert_eq!(
            msgs[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"command":"ls"}"#
        );
        assert_eq!(msgs[3]["role"], "tool");
        assert_eq!(msgs[3]["tool_call_id"], "call_1");
        assert_eq!(msgs[3]["content"], "a.txt");
    }

    #[test]
    fn test_build_tools() {
        let tools = vec![ToolSpec::new("bash", "Run", json!({"type": "object"}))];
        let out = build_tools(&tools);
        assert_eq!(out[0]["type"], "function");
        assert_eq!(out[0]["function"]["name"], "bash");
        assert_eq!(out[0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_translate_text_and_tool_chunks() {
        let mut t = OpenAiStreamTranslator::default();
        let out = t.translate(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#);
        assert_eq!(out, vec![StreamDelta::content("Hi")]);

        let out = t.translate(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_9","function":{"name":"bash","arguments":""}}]}}]}"#,
        );
        assert_eq!(
            out,
            vec![StreamDelta::ToolCallFragment(ToolCallFragment::start(0, "call_9", "bash"))]
        );

        let out = t.translate(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"command\""}}]}}]}"#,
        );
        assert_eq!(
            out,
            vec![StreamDelta::ToolCallFragment(ToolCallFragment::arguments(0, r#"{"command""#))]
        );

        assert!(t
            .translate(r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#)
            .is_empty());
        assert_eq!(t.translate("[DONE]"), vec![StreamDelta::done("tool_calls")]);
        assert!(t.translate("[DONE]").is_empty());
    }

    #[test]
    fn test_translate_error_chunk() {
        let mut t = OpenAiStreamTranslator::default();
        let out = t.translate(r#"{"error":{"message":"rate limited"}}"#);
        assert_eq!(out, vec![StreamDelta::error("rate limited")]);
    }

    #[test]
    fn test_translate_skips_garbage() {
        let mut t = OpenAiStreamTranslator::default();
        assert!(t.translate("not json").is_empty());
    }

    #[test]
    fn test_select_model() {
        let mut cfg = ProviderConfig::new("groq", ProviderKind::Groq);
        cfg.models = vec!["llama-a".into(), "llama-b".into()];
        let mut adapter = OpenAiAdapter::new(cfg);
        assert_eq!(adapter.current_model(), "llama-a");
        adapter.select_model("llama-b").unwrap();
        assert_eq!(adapter.current_model(), "llama-b");
        assert!(matches!(
            adapter.select_model("gpt-9"),
            Err(CodaError::ModelNotRecognized(_))
        ));
        assert!(!adapter.capabilities().vision);
    }
}
