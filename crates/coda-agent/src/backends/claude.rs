use super::sse::{spawn_sse_reader, SseTranslator};
use super::{Capabilities, ProviderAdapter, TurnOptions};
use crate::config::ProviderConfig;
use crate::stream::{DeltaStream, StreamDelta, ToolCallFragment};
use coda_core::{CodaError, CodaResult, Message, Role};
use coda_tools::ToolSpec;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude (Anthropic Messages API) adapter.
pub struct ClaudeAdapter {
    config: ProviderConfig,
    model: String,
    http: reqwest::Client,
}

impl ClaudeAdapter {
    /// An adapter for `config`.
    pub fn new(config: ProviderConfig) -> Self {
        let model = config.initial_model();
        Self {
            config,
            model,
            http: reqwest::Client::new(),
        }
    }

    fn build_body(
        &self,
        history: &[Message],
        tools: &[ToolSpec],
        options: &TurnOptions,
    ) -> CodaResult<Value> {
        let (system, messages) = build_messages(history);
        let claude_tools: Vec<ClaudeTool> = tools
            .iter()
            .map(|t| ClaudeTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters_schema.clone(),
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": options.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": messages,
            "stream": true,
        });

        if let Some(sys) = system {
            body["system"] = json!(sys);
        }
        if let Some(temperature) = options.temperature.or(self.config.temperature) {
            body["temperature"] = json!(temperature);
        }
        if !claude_tools.is_empty() {
            body["tools"] = serde_json::to_value(&claude_tools)?;
        }
        Ok(body)
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
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
        let url = format!("{}/v1/messages", self.config.base_url());
        let body = self.build_body(history, tools, options)?;

        debug!(
            provider = %self.config.id,
            model = %self.model,
            messages = history.len(),
            tools = tools.len(),
            "Starting Claude stream"
        );

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
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
                "Claude API error {status}: {error_body}"
            )));
        }

        Ok(spawn_sse_reader(resp, ClaudeStreamTranslator::default()))
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
            vision: true,
            max_tokens: self.config.max_tokens,
        }
    }
}

// -- Claude wire types --

#[derive(Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: Value,
}

/// Translates the universal history into a Claude `system` string and
/// message list.
///
/// System messages are joined into the top-level prompt. Tool results become
/// `tool_result` blocks of a `user` message; consecutive results share one.
pub fn build_messages(history: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut messages: Vec<Value> = Vec::new();
    let mut tool_results: Vec<Value> = Vec::new();

    for m in history {
        if m.role != Role::Tool && !tool_results.is_empty() {
            messages.push(json!({ "role": "user", "content": std::mem::take(&mut tool_results) }));
        }

        match m.role {
            Role::System => system_parts.push(m.text()),
            Role::User => messages.push(json!({ "role": "user", "content": m.text() })),
            Role::Assistant if m.has_tool_calls() => {
                let mut blocks = Vec::new();
                if !m.text().is_empty() {
                    blocks.push(json!({ "type": "text", "text": m.text() }));
                }
                for call in &m.tool_calls {
                    let input = call.arguments().unwrap_or_else(|_| json!({}));
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": input,
                    }));
                }
                messages.push(json!({ "role": "assistant", "content": blocks }));
            }
            // The Messages API rejects empty assistant text.
            Role::Assistant if m.text().is_empty() => {
                debug!(message_id = %m.id, "Skipping empty assistant message");
            }
            Role::Assistant => {
                messages.push(json!({ "role": "assistant", "content": m.text() }));
            }
            Role::Tool => {
                let mut block = json!({
                    "type": "tool_result",
                    "tool_use_id": m.tool_call_id,
                    "content": m.text(),
                });
                if m.is_error {
                    block["is_error"] = json!(true);
                }
                tool_results.push(block);
            }
        }
    }

    if !tool_results.is_empty() {
        messages.push(json!({ "role": "user", "content": tool_results }));
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, messages)
}

/// Maps Messages API stream events to deltas.
///
/// Tool blocks are addressed by their content block index. A tool block that
/// closes without any `input_json_delta` gets a synthetic `{}` fragment so it
/// still completes.
#[derive(Debug, Default)]
pub struct ClaudeStreamTranslator {
    tool_blocks: HashMap<usize, bool>,
    stop_reason: Option<String>,
    done: bool,
}

impl ClaudeStreamTranslator {
    /// Deltas carried by one SSE event payload. Updates block state.
    pub fn translate(&mut self, data: &str) -> Vec<StreamDelta> {
        if self.done {
            return Vec::new();
        }

        let event: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Skipping unparsable stream event");
                return Vec::new();
            }
        };

        let index = event["index"]
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .unwrap_or(0);

        match event["type"].as_str().unwrap_or("") {
            "content_block_start" => {
                let block = &event["content_block"];
                if block["type"].as_str() != Some("tool_use") {
                    return Vec::new();
                }
                self.tool_blocks.insert(index, false);
                vec![StreamDelta::ToolCallFragment(ToolCallFragment::start(
                    index,
                    block["id"].as_str().unwrap_or_default(),
                    block["name"].as_str().unwrap_or_default(),
                ))]
            }

            "content_block_delta" => {
                let delta = &event["delta"];
                match delta["type"].as_str().unwrap_or("") {
                    "text_delta" => delta["text"]
                        .as_str()
                        .filter(|t| !t.is_empty())
                        .map(|t| vec![StreamDelta::content(t)])
                        .unwrap_or_default(),
                    "input_json_delta" => {
                        let Some(partial) = delta["partial_json"].as_str().filter(|p| !p.is_empty())
                        else {
                            return Vec::new();
                        };
                        if let Some(seen) = self.tool_blocks.get_mut(&index) {
                            *seen = true;
                        }
                        vec![StreamDelta::ToolCallFragment(ToolCallFragment::arguments(
                            index, partial,
                        ))]
                    }
                    _ => Vec::new(),
                }
            }

            "content_block_stop" => match self.tool_blocks.remove(&index) {
                Some(false) => vec![StreamDelta::ToolCallFragment(ToolCallFragment::arguments(
                    index, "{}",
                ))],
                _ => Vec::new(),
            },

            "message_delta" => {
                if let Some(sr) = event["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(sr.to_string());
                }
                Vec::new()
            }

            "message_stop" => {
                self.done = true;
                let reason = self.stop_reason.take().unwrap_or_else(|| "end_turn".into());
                vec![StreamDelta::done(reason)]
            }

            "error" => {
                self.done = true;
                let message = event["error"]["message"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| event["error"].to_string());
                vec![StreamDelta::error(message)]
            }

            _ => Vec::new(),
        }
    }
}

impl SseTranslator for ClaudeStreamTranslator {
    fn translate(&mut self, data: &str) -> Vec<StreamDelta> {
        ClaudeStreamTranslator::translate(self, data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use coda_core::{ToolCallRequest, ToolResult};

    #[test]
    fn test_build_messages_merges_tool_results() {
        let history = vec![
            Message::system("be brief"),
            Message::user("look around"),
            Message::assistant_with_tools(
                "Checking.",
                vec![
                    ToolCallRequest::new("toolu_1", "bash", r#"{"command":"ls"}"#),
                    ToolCallRequest::new("toolu_2", "read_file", r#"{"path":"a.txt"}"#),
                ],
            ),
            Message::tool("toolu_1", "bash", "a.txt"),
            Message::tool("toolu_2", "read_file", "hello"),
            Message::assistant("Done."),
        ];

        let (system, msgs) = build_messages(&history);
        assert_eq!(system.as_deref(), Some("be brief"));
        assert_eq!(msgs.len(), 4);

        assert_eq!(msgs[1]["content"][0]["type"], "text");
        assert_eq!(msgs[1]["content"][1]["type"], "tool_use");
        assert_eq!(msgs[1]["content"][1]["input"]["command"], "ls");

        assert_eq!(msgs[2]["role"], "user");
        let results = msgs[2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["tool_use_id"], "toolu_1");
        assert_eq!(results[1]["content"], "hello");

        assert_eq!(msgs[3]["role"], "assistant");
    }

    #[test]
    fn test_build_messages_skips_empty_assistant_text() {
        let history = vec![
            Message::user("hi"),
            Message::assistant(""),
            Message::user("again"),
        ];
        let (_, msgs) = build_messages(&history);
        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().all(|m| m["role"] == "user"));
        assert!(msgs.iter().all(|m| m["content"] != ""));
    }

    #[test]
    fn test_build_messages_flags_failed_tool_results() {
        let history = vec![
            Message::user("run both"),
            Message::assistant_with_tools(
                "",
                vec![
                    ToolCallRequest::new("toolu_1", "bash", r#"{"command":"true"}"#),
                    ToolCallRequest::new("toolu_2", "bash", r#"{"command":"false"}"#),
                ],
            ),
            Message::tool_result("toolu_1", "bash", &ToolResult::success("ok")),
            Message::tool_result("toolu_2", "bash", &ToolResult::failure("exit 1")),
        ];
        let (_, msgs) = build_messages(&history);
        let results = msgs[2]["content"].as_array().unwrap();
        assert!(results[0].get("is_error").is_none());
        assert_eq!(results[1]["is_error"], true);
        assert_eq!(results[1]["content"], "Error: exit 1");
    }

    #[test]
    fn test_build_messages_translates_foreign_call_ids() {
        // History produced by an OpenAI-compatible provider before a switch.
        let history = vec![
            Message::user("hi"),
            Message::assistant_with_tools(
                "",
                vec![ToolCallRequest::new("call_abc", "todo_list", "")],
            ),
            Message::tool("call_abc", "todo_list", "No tasks"),
        ];
        let (system, msgs) = build_messages(&history);
        assert!(system.is_none());
        assert_eq!(msgs[1]["content"].as_array().unwrap().len(), 1);
        assert_eq!(msgs[1]["content"][0]["id"], "call_abc");
        assert_eq!(msgs[1]["content"][0]["input"], json!({}));
        assert_eq!(msgs[2]["content"][0]["tool_use_id"], "call_abc");
    }

    #[test]
    fn test_translate_text_and_tool_events() {
        let mut t = ClaudeStreamTranslator::default();
        assert!(t.translate(r#"{"type":"message_start","message":{}}"#).is_empty());
        assert!(t
            .translate(r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#)
            .is_empty());
        assert_eq!(
            t.translate(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#),
            vec![StreamDelta::content("Hi")]
        );
        assert_eq!(
            t.translate(r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"bash","input":{}}}"#),
            vec![StreamDelta::ToolCallFragment(ToolCallFragment::start(1, "toolu_1", "bash"))]
        );
        assert_eq!(
            t.translate(r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"command\":\"ls\"}"}}"#),
            vec![StreamDelta::ToolCallFragment(ToolCallFragment::arguments(1, r#"{"command":"ls"}"#))]
        );
        assert!(t.translate(r#"{"type":"content_block_stop","index":1}"#).is_empty());
        assert!(t
            .translate(r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"}}"#)
            .is_empty());
        assert_eq!(
            t.translate(r#"{"type":"message_stop"}"#),
            vec![StreamDelta::done("tool_use")]
        );
    }

    #[test]
    fn test_argumentless_tool_block_gets_empty_object() {
        let mut t = ClaudeStreamTranslator::default();
        t.translate(r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"todo_list","input":{}}}"#);
        assert_eq!(
            t.translate(r#"{"type":"content_block_stop","index":0}"#),
            vec![StreamDelta::ToolCallFragment(ToolCallFragment::arguments(0, "{}"))]
        );
    }

    #[test]
    fn test_translate_error_event() {
        let mut t = ClaudeStreamTranslator::default();
        assert_eq!(
            t.translate(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#),
            vec![StreamDelta::error("Overloaded")]
        );
    }
}
