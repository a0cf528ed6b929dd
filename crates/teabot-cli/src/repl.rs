//! Interactive REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent history.

use anyhow::Result;
use colored::Colorize;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use teabot_agent::AgentLoop;

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// Forgets the current session's conversation.
const RESET_COMMAND: &str = "/reset";

/// Run the interactive REPL loop.
pub async fn run(agent: AgentLoop, session_id: &str) -> Result<()> {
    helpers::print_banner();

    let mut editor = create_editor()?;

    loop {
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted)
            | Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        if is_exit_command(trimmed) {
            println!("\nGoodbye! 👋");
            break;
        }

        let _ = editor.add_history_entry(&input);

        if trimmed.eq_ignore_ascii_case(RESET_COMMAND) {
            match agent.sessions().clear(session_id).await {
                Ok(()) => println!("{}\n", "Conversation cleared.".dimmed()),
                Err(e) => eprintln!("\n❌ Failed to clear session: {e}\n"),
            }
            continue;
        }

        debug!(session = session_id, input = trimmed, "processing input");
        helpers::print_thinking();

        let result = agent.process_direct(session_id, trimmed).await;
        helpers::clear_thinking();
        match result {
            Ok(response) => helpers::print_response(&response),
            Err(e) => eprintln!("\n❌ Error: {e}\n"),
        }
    }

    save_history(&mut editor);

    Ok(())
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

/// `~/.teabot/history/cli_history`
fn history_path() -> std::path::PathBuf {
    teabot_core::utils::get_data_path()
        .join("history")
        .join("cli_history")
}

fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
