//! Teabot Agent — output parser, prompt builder, tools, and the agent loop.
//!
//! This crate contains:
//! - **parser**: turns raw model text into an action, a final answer, or a parse error
//! - **scratchpad**: the action/observation log of one invocation
//! - **prompt**: template validation and prompt rendering
//! - **tools**: Tool trait, registry, and the JSON search tools
//! - **agent_loop**: the bounded prompt → completion → dispatch state machine

pub mod agent_loop;
pub mod parser;
pub mod prompt;
pub mod scratchpad;
pub mod tools;

pub use agent_loop::{AbortReason, AgentError, AgentLoop, AgentOutcome, AgentSettings};
pub use parser::{AgentAction, Instruction};
pub use prompt::{PromptError, PromptTemplate};
pub use scratchpad::Scratchpad;
pub use tools::{registry_from_config, Tool, ToolRegistry};
