//! Tool Registry — name → tool lookup and dispatch.
//!
//! The registry is filled once when the agent is built and then shared
//! read-only (behind `Arc`) by every invocation.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use teabot_core::utils::truncate_string;

use super::base::Tool;
use crate::parser::AgentAction;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
}

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Stores tools keyed by name and dispatches calls.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        info!(tool = %name, "registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Names of all registered tools, sorted for determinism.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// One `name: description` line per tool, sorted by name.
    pub fn describe(&self) -> String {
        self.tool_names()
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| format!("{}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run the requested tool and return the observation text.
    ///
    /// Never fails: unknown tools and tool errors become observation
    /// strings the model can react to. An empty string means the tool found
    /// nothing.
    pub async fn dispatch(&self, action: &AgentAction) -> String {
        let name = action.tool.as_str();
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "tool not found");
            return format!(
                "{name} is not a valid tool, try one of [{}].",
                self.tool_names().join(", ")
            );
        };

        match tool.run(&action.tool_input).await {
            Ok(output) => {
                info!(
                    tool = name,
                    input = %truncate_string(&action.tool_input, 80),
                    output_len = output.len(),
                    output = %truncate_string(&output, 120),
                    "tool dispatched"
                );
                output
            }
            Err(e) => {
                warn!(
                    tool = name,
                    input = %truncate_string(&action.tool_input, 80),
                    error = %e,
                    "tool execution failed"
                );
                format!("Error executing {name}: {e}")
            }
        }
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
