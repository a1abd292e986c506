//! Interactive terminal front end for Coda.

mod config;
mod repl;

use clap::Parser;
use coda_agent::{ConversationOrchestrator, ProviderRegistry};
use coda_builtins::{register_builtins, TodoList};
use coda_tools::ToolDispatchTable;
use config::CodaConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coda", about = "Coda: a streaming coding agent for the terminal")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "coda.toml")]
    config: PathBuf,

    /// Model to start with (overrides the first provider's default)
    #[arg(short, long)]
    model: Option<String>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli);

    let config = CodaConfig::load(&cli.config).await?;

    let mut registry = ProviderRegistry::from_configs(&config.providers);
    registry.initialize_all().await?;
    info!(providers = registry.len(), "Providers initialized");

    let mut tools = ToolDispatchTable::new();
    register_builtins(&mut tools, TodoList::new());
    info!(count = tools.tool_count(), "Built-in tools registered");

    let mut orchestrator = ConversationOrchestrator::new(registry, Arc::new(tools), &config.agent);
    if let Some(model) = &cli.model {
        orchestrator.switch_model(model)?;
    }

    repl::run(orchestrator).await
}
