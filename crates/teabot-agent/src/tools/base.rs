//! Tool trait — the interface every agent tool implements.

use async_trait::async_trait;
use thiserror::Error;

// ─────────────────────────────────────────────
// Tool trait
// ─────────────────────────────────────────────

/// Every agent tool implements this trait.
///
/// The prompt lists tools by `name()` and `description()`; the model calls
/// them with a single free-text input.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to call this tool (e.g. `"product_search"`).
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// Run the tool.
    ///
    /// `Ok("")` means "nothing found" and is not a failure. On `Err`, the
    /// registry converts the error into an observation string.
    async fn run(&self, input: &str) -> Result<String, ToolError>;
}

// ─────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────

/// Why a tool call failed. The `Display` text is what the model sees.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a JSON array of records: {reason}")]
    Malformed { path: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
