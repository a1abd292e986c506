//! Line-oriented REPL: slash commands and transcript rendering.

use coda_agent::{ConversationOrchestrator, OrchestratorEvent};
use coda_core::{Role, ToolResult};
use futures_util::StreamExt;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const RESULT_PREVIEW_CHARS: usize = 200;

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Models,
    Model(String),
    History,
    Clear,
    Quit,
    Help,
    Unknown(String),
    Message(String),
    Empty,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Message(line.to_string());
        };

        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(n, r)| (n, r.trim()));
        match name {
            "models" => Self::Models,
            "model" if !rest.is_empty() => Self::Model(rest.to_string()),
            "history" => Self::History,
            "clear" => Self::Clear,
            "quit" | "exit" => Self::Quit,
            "help" => Self::Help,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

const HELP: &str = "\
Commands:
  /models         list models of every configured provider
  /model <name>   switch the active model (history is kept)
  /history        show the conversation so far
  /clear          forget everything but the system prompt
  /quit           exit
Ctrl-C cancels a running request.";

pub async fn run(mut orchestrator: ConversationOrchestrator) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_banner(&orchestrator);

    loop {
        prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Unknown(cmd) => println!("Unknown command '{cmd}'. Try /help."),
            ReplCommand::Models => print_models(&orchestrator),
            ReplCommand::Model(model) => match orchestrator.switch_model(&model) {
                Ok(()) => println!("Switched to {model}"),
                Err(e) => println!("{e}"),
            },
            ReplCommand::History => print_history(&orchestrator),
            ReplCommand::Clear => {
                orchestrator.clear_history();
                println!("History cleared.");
            }
            ReplCommand::Message(text) => submit(&mut orchestrator, text).await?,
        }
    }

    Ok(())
}

async fn submit(orchestrator: &mut ConversationOrchestrator, text: String) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut events = std::pin::pin!(orchestrator.submit_user_message(text, cancel));
    let mut renderer = Renderer::default();
    while let Some(event) = events.next().await {
        renderer.render(&event)?;
    }

    interrupt.abort();
    Ok(())
}

/// Tracks whether the cursor sits mid-line after streamed text.
#[derive(Default)]
struct Renderer {
    mid_line: bool,
}

impl Renderer {
    fn render(&mut self, event: &OrchestratorEvent) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        match event {
            OrchestratorEvent::Content { text } => {
                write!(out, "{text}")?;
                self.mid_line = !text.ends_with('\n');
                return out.flush();
            }
            OrchestratorEvent::TokenUsage { estimated } => {
                debug!(estimated_tokens = estimated, "History size");
                return Ok(());
            }
            _ => {}
        }

        if std::mem::take(&mut self.mid_line) {
            writeln!(out)?;
        }
        match event {
            OrchestratorEvent::ToolCallsDetected { calls } => {
                for call in calls {
                    writeln!(out, "-> {}({})", call.name, call.raw_arguments)?;
                }
            }
            OrchestratorEvent::ToolResult { call, result } => {
                writeln!(out, "<- {} {}", call.name, summarize(result))?;
            }
            OrchestratorEvent::RoundLimitReached { limit } => {
                writeln!(out, "[stopped after {limit} tool rounds]")?;
            }
            OrchestratorEvent::Error { message } => writeln!(out, "[error] {message}")?,
            OrchestratorEvent::Cancelled => writeln!(out, "[cancelled]")?,
            OrchestratorEvent::Done
            | OrchestratorEvent::Content { .. }
            | OrchestratorEvent::TokenUsage { .. } => {}
        }
        out.flush()
    }
}

fn summarize(result: &ToolResult) -> String {
    let (status, body) = if result.success {
        ("ok", result.output.as_deref().unwrap_or_default())
    } else {
        ("failed", result.error.as_deref().unwrap_or_default())
    };
    let flat = body.replace('\n', " ");
    let preview: String = flat.chars().take(RESULT_PREVIEW_CHARS).collect();
    if preview.len() < flat.len() {
        format!("[{status}] {preview}...")
    } else {
        format!("[{status}] {preview}")
    }
}

fn prompt() -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    write!(out, "> ")?;
    out.flush()
}

fn print_banner(orchestrator: &ConversationOrchestrator) {
    match orchestrator.registry().active() {
        Ok(adapter) => println!(
            "Coda ({} / {}). Type /help for commands.",
            adapter.id(),
            adapter.current_model()
        ),
        Err(e) => println!("Coda: {e}"),
    }
}

fn print_models(orchestrator: &ConversationOrchestrator) {
    let registry = orchestrator.registry();
    let current = registry.active().ok().map(|a| (a.id(), a.current_model()));
    for (provider, model) in registry.list_models() {
        let marker = if current == Some((provider.as_str(), model.as_str())) {
            "*"
        } else {
            " "
        };
        println!("{marker} {provider:<12} {model}");
    }
}

fn print_history(orchestrator: &ConversationOrchestrator) {
    for message in orchestrator.history().messages() {
        match message.role {
            Role::Tool => println!(
                "[tool {}] {}",
                message.name.as_deref().unwrap_or("?"),
                message.text()
            ),
            Role::Assistant if message.has_tool_calls() => {
                let names: Vec<&str> = message.tool_calls.iter().map(|c| c.name.as_str()).collect();
                println!("[assistant] {} (calls: {})", message.text(), names.join(", "));
            }
            role => println!("[{role}] {}", message.text()),
        }
    }
    println!(
        "{} messages, ~{} tokens",
        orchestrator.history().len(),
        orchestrator.history().estimated_tokens()
    );
}
