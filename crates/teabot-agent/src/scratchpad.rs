//! Scratchpad — the ordered action/observation log of one agent invocation.

use crate::parser::AgentAction;

/// Tool name recorded for entries produced by unparsable replies.
pub const EXCEPTION_TOOL: &str = "_Exception";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScratchpadEntry {
    pub action: AgentAction,
    pub observation: String,
}

impl ScratchpadEntry {
    /// Whether this entry records a real tool call (not a format correction).
    pub fn is_tool_call(&self) -> bool {
        self.action.tool != EXCEPTION_TOOL
    }
}

/// Append-only log, replayed verbatim into each subsequent prompt.
#[derive(Clone, Debug, Default)]
pub struct Scratchpad {
    entries: Vec<ScratchpadEntry>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: AgentAction, observation: impl Into<String>) {
        self.entries.push(ScratchpadEntry {
            action,
            observation: observation.into(),
        });
    }

    /// Most recent non-empty observation from a real tool call.
    pub fn last_observation(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.is_tool_call())
            .map(|e| e.observation.trim())
            .find(|obs| !obs.is_empty())
    }

    /// Render every entry as
    /// `Action: <tool>\nAction Input: <input>\nObservation: <observation>\n`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str("Action: ");
            out.push_str(&entry.action.tool);
            out.push_str("\nAction Input: ");
            out.push_str(&entry.action.tool_input);
            out.push_str("\nObservation: ");
            out.push_str(&entry.observation);
            out.push('\n');
        }
        out
    }
}
