//! Teabot CLI — entry point.
//!
//! # Commands
//!
//! - `teabot agent [-m MESSAGE] [-s SESSION]` — chat (single-shot or REPL)
//! - `teabot serve [--host HOST] [--port PORT]` — HTTP endpoint for the shop front
//! - `teabot batch <QUESTIONS> [-o ANSWERS]` — answer a JSON file of questions
//! - `teabot status` — show configuration, provider and tool status

mod batch;
mod helpers;
mod repl;
mod server;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use teabot_agent::{registry_from_config, AgentLoop, AgentSettings, PromptTemplate};
use teabot_core::config::{load_config, Config};
use teabot_core::session::SessionManager;
use teabot_core::transcript::Transcript;
use teabot_core::utils::{expand_home, get_sessions_path};
use teabot_providers::create_provider;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 🍵 Teabot, a tool-using shop assistant
#[derive(Parser)]
#[command(name = "teabot", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent (single-shot or interactive REPL)
    Agent {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Session identifier
        #[arg(short, long, default_value = "cli:default")]
        session: String,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Serve the agent over HTTP
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Answer every question in a JSON file and write the answers
    Batch {
        /// JSON array of `{"question": "..."}` objects
        input: PathBuf,

        /// Where to write the `[{"question", "answer"}]` array
        #[arg(short, long, default_value = "answers.json")]
        output: PathBuf,

        /// Give every question its own session instead of one shared session
        #[arg(long, default_value_t = false)]
        isolated: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show configuration, provider and tool status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Agent {
            message,
            session,
            logs,
        } => {
            init_logging(logs);
            run_agent(message, session).await
        }
        Commands::Serve { host, port, logs } => {
            init_logging(logs);
            let mut config = load_config(None);
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::run(config).await
        }
        Commands::Batch {
            input,
            output,
            isolated,
            logs,
        } => {
            init_logging(logs);
            batch::run(load_config(None), &input, &output, isolated).await
        }
        Commands::Status => status::run(),
    }
}

// ─────────────────────────────────────────────
// Agent command
// ─────────────────────────────────────────────

async fn run_agent(message: Option<String>, session_id: String) -> Result<()> {
    let config = load_config(None);
    let agent_loop = build_agent_loop(&config)?;

    match message {
        Some(msg) => {
            info!(session = %session_id, "processing single message");
            let response = agent_loop
                .process_direct(&session_id, &msg)
                .await
                .context("agent processing failed")?;
            helpers::print_response(&response);
        }
        None => {
            repl::run(agent_loop, &session_id).await?;
        }
    }

    Ok(())
}

/// Build an `AgentLoop` from the loaded configuration.
pub fn build_agent_loop(config: &Config) -> Result<AgentLoop> {
    let provider = create_provider(&config.agent.model, &config.providers.to_map())
        .context("failed to create LLM provider")?;

    let tools = registry_from_config(&config.tools).context("failed to register tools")?;
    if tools.is_empty() {
        tracing::warn!("no tool data files configured; the agent can only chat");
    }

    let sessions = if config.sessions.persist {
        SessionManager::new(config.sessions.max_sessions, Some(get_sessions_path()))
            .context("failed to create session manager")?
    } else {
        SessionManager::in_memory(config.sessions.max_sessions)
    };

    let mut agent_loop = AgentLoop::new(
        Arc::new(provider),
        tools,
        Arc::new(sessions),
        AgentSettings::from_config(&config.agent),
    );

    if let Some(path) = &config.agent.prompt_template {
        let template = PromptTemplate::from_file(&expand_home(path))
            .context("failed to load prompt template")?;
        agent_loop = agent_loop.with_template(template);
    }

    if let Some(path) = &config.log.conversation_log {
        agent_loop = agent_loop.with_transcript(Transcript::new(expand_home(path)));
    }

    Ok(agent_loop)
}

/// Initialize tracing/logging. `RUST_LOG` wins when set.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("teabot=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
