//! Output parser — turns one raw model reply into a typed [`Instruction`].
//!
//! The model speaks a plain-text ReAct protocol:
//!
//! ```text
//! Thought: the customer wants a price
//! Action: product_search
//! Action Input: Earl Grey
//! ```
//!
//! or
//!
//! ```text
//! Thought: I now know the final answer
//! Final Answer: 200 rub per 100 g
//! ```
//!
//! Rules, applied in order:
//! 1. Lines starting with `Thought:` are private reasoning and are dropped.
//! 2. If `Final Answer:` appears, the text after its **last** occurrence is
//!    the answer. This wins over any `Action:` in the same reply.
//! 3. Otherwise an `Action:` line followed (anywhere later) by
//!    `Action Input:` yields a tool call.
//! 4. Otherwise the whole cleaned reply is taken as the answer.
//!
//! Malformed replies (nothing left after cleaning, an `Action:` line with no
//! input, or an empty tool name) become [`Instruction::ParseError`].

use std::sync::LazyLock;

use regex::Regex;

/// Prefix of private reasoning lines.
pub const REASONING_MARKER: &str = "Thought:";

/// Marker introducing the final answer.
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// Observation fed back to the model after an unparsable reply.
pub const INVALID_FORMAT_OBSERVATION: &str = "Invalid Format: reply with an \
    'Action:' line followed by an 'Action Input:' line, or with a line \
    starting with 'Final Answer:'.";

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\bAction\s*:[ \t]*([^\n]*?)[ \t]*(?:\n.*)?\bAction\s*Input\s*:(.*)")
        .expect("action pattern is a valid regex")
});

static ACTION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*Action\s*:").expect("action line pattern is a valid regex")
});

/// A request to run one tool with one string input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: String,
}

impl AgentAction {
    pub fn new(tool: impl Into<String>, tool_input: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            tool_input: tool_input.into(),
        }
    }
}

/// What the model asked for in one reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Action(AgentAction),
    Finish { answer: String },
    ParseError { raw_text: String, reason: String },
}

/// Parse one raw model reply.
pub fn parse(raw_text: &str) -> Instruction {
    let cleaned = strip_reasoning(raw_text);

    if let Some(pos) = cleaned.rfind(FINAL_ANSWER_MARKER) {
        let answer = cleaned[pos + FINAL_ANSWER_MARKER.len()..].trim();
        return Instruction::Finish {
            answer: answer.to_string(),
        };
    }

    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return parse_error(raw_text, "model reply was empty");
    }

    if let Some(caps) = ACTION_RE.captures(cleaned) {
        let tool = caps.get(1).map_or("", |m| m.as_str()).trim();
        let tool_input = caps.get(2).map_or("", |m| m.as_str()).trim();
        if tool.is_empty() {
            return parse_error(raw_text, "missing tool name after 'Action:'");
        }
        return Instruction::Action(AgentAction::new(tool, tool_input));
    }

    if ACTION_LINE_RE.is_match(cleaned) {
        return parse_error(raw_text, "missing 'Action Input:' after 'Action:'");
    }

    Instruction::Finish {
        answer: cleaned.to_string(),
    }
}

fn strip_reasoning(raw_text: &str) -> String {
    raw_text
        .lines()
        .filter(|line| !line.trim_start().starts_with(REASONING_MARKER))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_error(raw_text: &str, reason: &str) -> Instruction {
    Instruction::ParseError {
        raw_text: raw_text.to_string(),
        reason: reason.to_string(),
    }
}
