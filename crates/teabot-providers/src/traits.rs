//! LLM Provider trait — the completion seam the agent loop talks through.
//!
//! The `HttpProvider` in `http_provider.rs` covers all OpenAI-compatible APIs;
//! tests substitute scripted providers.

use async_trait::async_trait;
use thiserror::Error;

/// Sampling settings passed to each completion call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Stop sequences. The agent stops generation before the model can invent
    /// its own observation.
    pub stop: Vec<String>,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.0,
            stop: Vec::new(),
        }
    }
}

/// Why a completion call produced no text.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {provider} failed: {source}")]
    Request {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("could not parse {provider} response: {source}")]
    InvalidResponse {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} authentication failed: {reason}")]
    Auth { provider: String, reason: String },

    #[error("{provider} returned no completion text")]
    EmptyCompletion { provider: String },

    #[error(
        "no configured provider found for model '{0}'; set an API key \
         (e.g. TEABOT_PROVIDERS__OPENAI__API_KEY)"
    )]
    NotConfigured(String),
}

/// Trait that all completion providers implement.
///
/// One call takes the fully rendered prompt and returns the raw generated
/// text. Failures are returned, never folded into the text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        config: &LlmRequestConfig,
    ) -> Result<String, ProviderError>;

    /// The model this provider instance sends requests for.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
