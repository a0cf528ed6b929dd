//! Prompt builder — renders the exact text sent to the model.
//!
//! Templates use five placeholders:
//!
//! | placeholder          | replaced with                                    |
//! |----------------------|--------------------------------------------------|
//! | `{tools}`            | one `name: description` line per tool            |
//! | `{tool_names}`       | comma-separated tool names                       |
//! | `{history}`          | prior turns as `Human: …` / `AI: …` lines        |
//! | `{agent_scratchpad}` | action/observation log of the current invocation |
//! | `{input}`            | the user's message                               |
//!
//! Substitution happens in a single pass, so user text that happens to
//! contain `{history}` is left alone.

use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use teabot_core::types::ConversationTurn;

use crate::scratchpad::Scratchpad;
use crate::tools::ToolRegistry;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(tools|tool_names|history|agent_scratchpad|input)\}")
        .expect("placeholder pattern is a valid regex")
});

const REQUIRED_PLACEHOLDERS: &[&str] = &["{input}", "{agent_scratchpad}"];

/// Built-in ReAct template.
pub const DEFAULT_TEMPLATE: &str = "\
You are the assistant of an online tea shop. Answer the customer's questions \
as best you can. You have access to the following tools:

{tools}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Never write an Action and a Final Answer in the same reply. \
An empty Observation means the tool found nothing.

Previous conversation:
{history}

Question: {input}
{agent_scratchpad}";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("failed to read prompt template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A validated prompt template.
#[derive(Clone, Debug)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Validate a template. `{input}` and `{agent_scratchpad}` are required.
    pub fn new(text: impl Into<String>) -> Result<Self, PromptError> {
        let text = text.into();
        for placeholder in REQUIRED_PLACEHOLDERS {
            if !text.contains(placeholder) {
                return Err(PromptError::MissingPlaceholder(*placeholder));
            }
        }
        Ok(Self { text })
    }

    /// Load and validate a template file.
    pub fn from_file(path: &Path) -> Result<Self, PromptError> {
        let text = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::new(text)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Render the prompt for one completion call.
///
/// Pure: the same inputs always produce the same string.
pub fn build(
    template: &PromptTemplate,
    tools: &ToolRegistry,
    history: &[ConversationTurn],
    scratchpad: &Scratchpad,
    input: &str,
) -> String {
    PLACEHOLDER_RE
        .replace_all(template.as_str(), |caps: &Captures| match &caps[1] {
            "tools" => tools.describe(),
            "tool_names" => tools.tool_names().join(", "),
            "history" => render_history(history),
            "agent_scratchpad" => scratchpad.render(),
            _ => input.to_string(),
        })
        .into_owned()
}

/// Render turns as `Human: …` / `AI: …` lines, oldest first.
pub fn render_history(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.prompt_tag(), turn.text))
        .collect::<Vec<_>>()
        .join("\n")
}
