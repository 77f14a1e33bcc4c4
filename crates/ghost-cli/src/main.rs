//! ghost
//!
//! Chat with an LLM from the terminal. Tools come from external provider
//! processes started at launch; every tool call waits for the user's
//! confirmation.

mod cli;
mod config;
mod console;
mod logging;
mod prompt;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use ghost_core::provider::select_llm;
use ghost_core::{
    BootstrapProgress, GhostError, HumanConsole, InvocationGateway, LlmProvider, Notice, Prompt,
    bootstrap,
};
use ghost_runtime::{McpLauncher, build_provider};

use crate::cli::Cli;
use crate::config::GhostConfig;
use crate::console::{BootstrapSpinner, TerminalConsole};

#[tokio::main]
async fn main() {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        let detail = format!("{err:#}");
        match err.downcast_ref::<GhostError>() {
            Some(ghost) => eprintln!("Error: {}\n  {detail}", ghost.user_message()),
            None => eprintln!("Error: {detail}"),
        }
        // exit here so a pending stdin read cannot hold the runtime open
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let terminal = Arc::new(TerminalConsole::new());

    let (config_path, config) = GhostConfig::load(cli.config.as_deref())?;
    terminal.show(Notice::Info(format!(
        "Reading config file: {}",
        config_path.display()
    )));

    // Guard flushes the log file on drop
    let (_, _log_guard) = logging::init(config.log_path.as_deref(), &config.log_level)
        .context("Failed to initialize logger")?;
    tracing::info!(config = %config_path.display(), "Starting ghost");

    let result = chat(&cli, &config, terminal).await;
    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "ghost exited with an error");
    }
    result
}

async fn chat(cli: &Cli, config: &GhostConfig, terminal: Arc<TerminalConsole>) -> Result<()> {
    tracing::info!(path = %cli.prompt.display(), "Read prompt file");
    let mut prompt = Prompt::user(prompt::render_file(&cli.prompt)?);
    if let Some(system_path) = &cli.system {
        let system = std::fs::read_to_string(system_path)
            .with_context(|| format!("Failed to read system prompt {}", system_path.display()))?;
        prompt = prompt.with_system(system);
    }
    tracing::debug!(prompt = %prompt.user, "Prompt rendered");

    let llm = select_llm(&config.llms, cli.llm.as_deref())?;
    let model = cli.model_or(&llm.model).to_string();
    let backend = build_provider(llm);
    tracing::info!(llm = %llm.name, api_type = %backend.api_type(), model = %model, "LLM selected");

    let progress = Arc::new(BootstrapSpinner::new());
    let launched = bootstrap(
        &config.mcps,
        Arc::new(McpLauncher::new()),
        Arc::clone(&progress) as Arc<dyn BootstrapProgress>,
    )
    .await;
    progress.finish();
    let runtime = launched.context("Failed to initialize MCP")?;

    let gateway = InvocationGateway::new(
        Arc::clone(&runtime.registry),
        terminal as Arc<dyn HumanConsole>,
    );

    let outcome = tokio::select! {
        outcome = backend.converse(&prompt, &model, &runtime.tools, &gateway) => {
            outcome.map_err(anyhow::Error::from)
        }
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted")),
    };
    runtime.shutdown().await;

    let outcome = outcome.context("Chat ended with an error")?;
    tracing::info!(
        turns = outcome.turns,
        tool_calls = outcome.tool_calls,
        result = %outcome.final_text,
        "Chat done"
    );
    Ok(())
}
