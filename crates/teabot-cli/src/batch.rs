//! `teabot batch` — answer a file of questions in one go.
//!
//! Input is a JSON array of objects; each object's `question` string is
//! asked in order. Objects without a non-empty `question` are skipped.
//! Output is a pretty-printed `[{"question": "...", "answer": "..."}]` array.
//!
//! By default every question goes through the shared `"batch"` session, so
//! later answers see earlier exchanges. `--isolated` gives each question
//! its own session instead.

use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::Value;
use tracing::{info, warn};

use teabot_agent::AgentLoop;
use teabot_core::config::Config;
use teabot_core::transcript::TranscriptEntry;
use teabot_core::utils::truncate_string;

pub const BATCH_SESSION: &str = "batch";

/// Build the agent from config and answer `input` into `output`.
pub async fn run(config: Config, input: &Path, output: &Path, isolated: bool) -> Result<()> {
    let agent = crate::build_agent_loop(&config)?;
    let answered = process_file(&agent, input, output, isolated).await?;
    println!(
        "{} {} answers written to {}",
        "🍵".green(),
        answered,
        output.display()
    );
    Ok(())
}

/// Read questions from `input`, answer them, write the answers to `output`.
/// Returns the number of answered questions.
pub async fn process_file(
    agent: &AgentLoop,
    input: &Path,
    output: &Path,
    isolated: bool,
) -> Result<usize> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    let questions =
        read_questions(&raw).with_context(|| format!("invalid questions file {}", input.display()))?;

    let entries = answer_questions(agent, &questions, isolated).await?;

    let json = serde_json::to_string_pretty(&entries)?;
    tokio::fs::write(output, json)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(entries.len())
}

/// Extract the questions from a JSON array of `{"question": ...}` objects.
pub fn read_questions(raw: &str) -> Result<Vec<String>> {
    let items: Value = serde_json::from_str(raw)?;
    let Value::Array(items) = items else {
        bail!("expected a JSON array of {{\"question\": ...}} objects");
    };

    let mut questions = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match item.get("question").and_then(Value::as_str).map(str::trim) {
            Some(q) if !q.is_empty() => questions.push(q.to_string()),
            _ => warn!(index = idx, "skipping item without a question"),
        }
    }
    Ok(questions)
}

/// Ask each question in order.
pub async fn answer_questions(
    agent: &AgentLoop,
    questions: &[String],
    isolated: bool,
) -> Result<Vec<TranscriptEntry>> {
    let mut entries = Vec::with_capacity(questions.len());
    for (idx, question) in questions.iter().enumerate() {
        let session = if isolated {
            format!("{BATCH_SESSION}:{idx}")
        } else {
            BATCH_SESSION.to_string()
        };

        info!(
            index = idx,
            total = questions.len(),
            question = %truncate_string(question, 80),
            "batch question"
        );
        let answer = agent
            .process_direct(&session, question)
            .await
            .with_context(|| format!("failed to answer question {}", idx + 1))?;

        entries.push(TranscriptEntry {
            question: question.clone(),
            answer,
        });
    }
    Ok(entries)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
