//! Configuration schema.
//!
//! Hierarchy: `Config` → `AgentConfig`, `ProvidersConfig`, `ToolsConfig`,
//! `ServerConfig`, `SessionsConfig`, `LogConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default number of model ↔ tool iterations per user turn.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Hard ceiling on `maxIterations`, whatever the config says.
pub const MAX_ITERATIONS_LIMIT: u32 = 10;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration, loaded from `~/.teabot/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agent: AgentConfig,
    pub providers: ProvidersConfig,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
    pub sessions: SessionsConfig,
    pub log: LogConfig,
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Agent loop settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// LLM model identifier.
    pub model: String,
    /// Maximum tokens to generate per completion.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Iteration budget per user turn (clamped to `1..=MAX_ITERATIONS_LIMIT`).
    pub max_iterations: u32,
    /// Timeout for one completion call, in seconds.
    pub completion_timeout_secs: u64,
    /// Number of most recent conversation turns rendered into the prompt.
    pub history_limit: usize,
    /// Optional path to a custom prompt template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            completion_timeout_secs: 60,
            history_limit: 20,
            prompt_template: None,
        }
    }
}

impl AgentConfig {
    /// The iteration budget actually enforced.
    pub fn effective_max_iterations(&self) -> u32 {
        self.max_iterations.clamp(1, MAX_ITERATIONS_LIMIT)
    }
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Configuration for a single LLM provider (API key, base URL, headers).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
    /// Token endpoint for providers that trade the key for short-lived
    /// access tokens (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    /// OAuth scope requested from the token endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// All provider configurations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub openrouter: ProviderConfig,
    pub openai: ProviderConfig,
    pub deepseek: ProviderConfig,
    pub groq: ProviderConfig,
    pub gigachat: ProviderConfig,
    pub vllm: ProviderConfig,
}

impl ProvidersConfig {
    /// Get a provider config by name (e.g. `"openai"`).
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "openrouter" => Some(&self.openrouter),
            "openai" => Some(&self.openai),
            "deepseek" => Some(&self.deepseek),
            "groq" => Some(&self.groq),
            "gigachat" => Some(&self.gigachat),
            "vllm" => Some(&self.vllm),
            _ => None,
        }
    }

    /// Convert to a map keyed by provider name, for the provider registry.
    pub fn to_map(&self) -> HashMap<String, ProviderConfig> {
        [
            ("openrouter", &self.openrouter),
            ("openai", &self.openai),
            ("deepseek", &self.deepseek),
            ("groq", &self.groq),
            ("gigachat", &self.gigachat),
            ("vllm", &self.vllm),
        ]
        .into_iter()
        .map(|(name, config)| (name.to_string(), config.clone()))
        .collect()
    }
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// Backing files for the search tools. A tool is only registered when its
/// path is set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    /// Product catalog (`[{name, description, price}]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<String>,
    /// Orders (`[{order_number, status, customer, total, delivery_date}]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders_path: Option<String>,
    /// Similar products (`[{product_name, similar_products: [...]}]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similar_path: Option<String>,
}

// ─────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

// ─────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────

/// Conversation memory settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionsConfig {
    /// Maximum number of sessions kept in memory; idle ones are evicted LRU.
    pub max_sessions: usize,
    /// Persist sessions as JSONL under `~/.teabot/sessions/`.
    pub persist: bool,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1024,
            persist: false,
        }
    }
}

// ─────────────────────────────────────────────
// Log
// ─────────────────────────────────────────────

/// Audit log settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogConfig {
    /// Path of the `{question, answer}` conversation log. Disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_log: Option<String>,
}
