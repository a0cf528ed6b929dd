//! Config loader — reads `~/.teabot/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.teabot/config.json`
//! 3. Environment variables `TEABOT_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{Config, ProviderConfig};

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the given (or default) path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    apply_env_overrides(load_config_from_path(&config_path))
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to parse config {}: {}", path.display(), e);
            Config::default()
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `TEABOT_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `TEABOT_AGENT__MODEL`, `TEABOT_AGENT__MAX_ITERATIONS`,
///   `TEABOT_AGENT__TEMPERATURE`, `TEABOT_AGENT__COMPLETION_TIMEOUT_SECS`
/// - `TEABOT_PROVIDERS__<NAME>__API_KEY`, `TEABOT_PROVIDERS__<NAME>__API_BASE`,
///   `TEABOT_PROVIDERS__<NAME>__AUTH_URL`, `TEABOT_PROVIDERS__<NAME>__SCOPE`
/// - `TEABOT_TOOLS__CATALOG_PATH`, `TEABOT_TOOLS__ORDERS_PATH`, `TEABOT_TOOLS__SIMILAR_PATH`
/// - `TEABOT_SERVER__HOST`, `TEABOT_SERVER__PORT`
/// - `TEABOT_LOG__CONVERSATION_LOG`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("TEABOT_AGENT__MODEL") {
        config.agent.model = val;
    }
    if let Some(n) = parse_env("TEABOT_AGENT__MAX_ITERATIONS") {
        config.agent.max_iterations = n;
    }
    if let Some(t) = parse_env("TEABOT_AGENT__TEMPERATURE") {
        config.agent.temperature = t;
    }
    if let Some(secs) = parse_env("TEABOT_AGENT__COMPLETION_TIMEOUT_SECS") {
        config.agent.completion_timeout_secs = secs;
    }

    apply_provider_env(&mut config.providers.openrouter, "OPENROUTER");
    apply_provider_env(&mut config.providers.openai, "OPENAI");
    apply_provider_env(&mut config.providers.deepseek, "DEEPSEEK");
    apply_provider_env(&mut config.providers.groq, "GROQ");
    apply_provider_env(&mut config.providers.gigachat, "GIGACHAT");
    apply_provider_env(&mut config.providers.vllm, "VLLM");

    if let Ok(val) = std::env::var("TEABOT_TOOLS__CATALOG_PATH") {
        config.tools.catalog_path = Some(val);
    }
    if let Ok(val) = std::env::var("TEABOT_TOOLS__ORDERS_PATH") {
        config.tools.orders_path = Some(val);
    }
    if let Ok(val) = std::env::var("TEABOT_TOOLS__SIMILAR_PATH") {
        config.tools.similar_path = Some(val);
    }

    if let Ok(val) = std::env::var("TEABOT_SERVER__HOST") {
        config.server.host = val;
    }
    if let Some(port) = parse_env("TEABOT_SERVER__PORT") {
        config.server.port = port;
    }

    if let Ok(val) = std::env::var("TEABOT_LOG__CONVERSATION_LOG") {
        config.log.conversation_log = Some(val);
    }

    config
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let val = std::env::var(key).ok()?;
    match val.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %val, "ignoring unparsable env override");
            None
        }
    }
}

fn apply_provider_env(provider: &mut ProviderConfig, name: &str) {
    if let Ok(val) = std::env::var(format!("TEABOT_PROVIDERS__{name}__API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("TEABOT_PROVIDERS__{name}__API_BASE")) {
        provider.api_base = Some(val);
    }
    if let Ok(val) = std::env::var(format!("TEABOT_PROVIDERS__{name}__AUTH_URL")) {
        provider.auth_url = Some(val);
    }
    if let Ok(val) = std::env::var(format!("TEABOT_PROVIDERS__{name}__SCOPE")) {
        provider.scope = Some(val);
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
