//! Provider registry — static specs for the supported completion providers.
//!
//! Each `ProviderSpec` describes how to connect to a provider: keywords for
//! model matching, default API base, and routing quirks.

use std::collections::HashMap;

// ─────────────────────────────────────────────
// ProviderSpec: static metadata for one provider
// ─────────────────────────────────────────────

/// How requests to a provider are authenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <api_key>`; no header when the key is empty.
    Bearer,
    /// The API key is a Basic credential traded at `token_url` for
    /// short-lived bearer tokens.
    OAuth {
        token_url: &'static str,
        default_scope: &'static str,
    },
}

/// Static specification describing one LLM provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name, also the key in `providers` config (e.g. `"openrouter"`).
    pub name: &'static str,
    /// Keywords to match in model names (lowercase).
    pub keywords: &'static [&'static str],
    /// Human-readable name for logs.
    pub display_name: &'static str,
    /// Gateways accept `vendor/model` ids as-is and serve as fallback when no
    /// direct provider matches.
    pub is_gateway: bool,
    /// Self-hosted endpoint; usable with only an API base configured.
    pub is_local: bool,
    /// Default API base URL.
    pub default_api_base: &'static str,
    pub auth: AuthScheme,
}

/// Supported providers, in matching priority order.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openrouter",
        keywords: &["openrouter"],
        display_name: "OpenRouter",
        is_gateway: true,
        is_local: false,
        default_api_base: "https://openrouter.ai/api/v1",
        auth: AuthScheme::Bearer,
    },
    ProviderSpec {
        name: "openai",
        keywords: &["openai", "gpt"],
        display_name: "OpenAI",
        is_gateway: false,
        is_local: false,
        default_api_base: "https://api.openai.com/v1",
        auth: AuthScheme::Bearer,
    },
    ProviderSpec {
        name: "deepseek",
        keywords: &["deepseek"],
        display_name: "DeepSeek",
        is_gateway: false,
        is_local: false,
        default_api_base: "https://api.deepseek.com/v1",
        auth: AuthScheme::Bearer,
    },
    ProviderSpec {
        name: "groq",
        keywords: &["groq"],
        display_name: "Groq",
        is_gateway: false,
        is_local: false,
        default_api_base: "https://api.groq.com/openai/v1",
        auth: AuthScheme::Bearer,
    },
    ProviderSpec {
        name: "gigachat",
        keywords: &["gigachat"],
        display_name: "GigaChat",
        is_gateway: false,
        is_local: false,
        default_api_base: "https://gigachat.devices.sberbank.ru/api/v1",
        auth: AuthScheme::OAuth {
            token_url: "https://ngw.devices.sberbank.ru:9443/api/v2/oauth",
            default_scope: "GIGACHAT_API_PERS",
        },
    },
    ProviderSpec {
        name: "vllm",
        keywords: &["vllm"],
        display_name: "vLLM",
        is_gateway: false,
        is_local: true,
        default_api_base: "http://localhost:8000/v1",
        auth: AuthScheme::Bearer,
    },
];

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

/// Find a provider spec by matching keywords against a model name.
///
/// Skips gateways and local providers; those are fallback only.
pub fn find_by_model(model: &str) -> Option<&'static ProviderSpec> {
    let model_lower = model.to_lowercase();
    PROVIDERS.iter().find(|spec| {
        !spec.is_gateway
            && !spec.is_local
            && spec.keywords.iter().any(|kw| model_lower.contains(kw))
    })
}

/// Find a provider spec by exact name.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

/// Resolve the model name sent on the wire.
///
/// Config uses routing ids like `"deepseek/deepseek-chat"`. Direct providers
/// want the bare model, so a leading `"<vendor>/"` is stripped; gateways get
/// the id unchanged.
pub fn resolve_model_name(model: &str, spec: &ProviderSpec) -> String {
    if spec.is_gateway {
        return model.to_string();
    }
    match model.split_once('/') {
        Some((_, bare)) if !bare.is_empty() => bare.to_string(),
        _ => model.to_string(),
    }
}

/// Provider config lives in core.
pub use teabot_core::config::schema::ProviderConfig;

fn is_usable(spec: &ProviderSpec, config: &ProviderConfig) -> bool {
    config.is_configured() || (spec.is_local && config.api_base.is_some())
}

/// Match a model name to a configured provider.
///
/// 1. Direct keyword match, only if that provider is configured.
/// 2. The first configured gateway, then the first configured local endpoint.
pub fn match_provider<'a>(
    model: &str,
    providers: &'a HashMap<String, ProviderConfig>,
) -> Option<(&'a ProviderConfig, &'static ProviderSpec)> {
    if let Some(spec) = find_by_model(model) {
        if let Some(config) = providers.get(spec.name) {
            if is_usable(spec, config) {
                return Some((config, spec));
            }
        }
    }

    let fallback = |want_gateway: bool| {
        PROVIDERS
            .iter()
            .filter(|s| if want_gateway { s.is_gateway } else { s.is_local })
            .find_map(|spec| {
                providers
                    .get(spec.name)
                    .filter(|c| is_usable(spec, c))
                    .map(|c| (c, spec))
            })
    };
    fallback(true).or_else(|| fallback(false))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(api_key: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: api_key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_find_by_model_gpt() {
        assert_eq!(find_by_model("gpt-4o-mini").unwrap().name, "openai");
    }

    #[test]
    fn test_only_gigachat_trades_key_for_tokens() {
        for spec in PROVIDERS {
            let oauth = matches!(spec.auth, AuthScheme::OAuth { .. });
            assert_eq!(oauth, spec.name == "gigachat", "{}", spec.name);
        }
    }

    #[test]
    fn test_find_by_model_gigachat() {
        assert_eq!(find_by_model("GigaChat-Max").unwrap().name, "gigachat");
    }

    #[test]
    fn test_find_by_model_deepseek() {
        assert_eq!(find_by_model("deepseek/deepseek-chat").unwrap().name, "deepseek");
    }

    #[test]
    fn test_find_by_model_skips_gateway_and_local() {
        assert!(find_by_model("openrouter/auto").is_none());
        assert!(find_by_model("vllm-model").is_none());
    }

    #[test]
    fn test_find_by_model_unknown() {
        assert!(find_by_model("mystery-model").is_none());
    }

    #[test]
    fn test_resolve_model_strips_vendor_for_direct() {
        let spec = find_by_name("openai").unwrap();
        assert_eq!(resolve_model_name("openai/gpt-4o-mini", spec), "gpt-4o-mini");
        assert_eq!(resolve_model_name("gpt-4o-mini", spec), "gpt-4o-mini");
    }

    #[test]
    fn test_resolve_model_keeps_id_for_gateway() {
        let spec = find_by_name("openrouter").unwrap();
        assert_eq!(
            resolve_model_name("openai/gpt-4o-mini", spec),
            "openai/gpt-4o-mini"
        );
    }

    #[test]
    fn test_match_provider_direct() {
        let mut providers = HashMap::new();
        providers.insert("gigachat".to_string(), keyed("gc-token"));

        let (config, spec) = match_provider("gigachat/GigaChat", &providers).unwrap();
        assert_eq!(spec.name, "gigachat");
        assert_eq!(config.api_key, "gc-token");
    }

    #[test]
    fn test_match_provider_gateway_fallback() {
        let mut providers = HashMap::new();
        providers.insert("openrouter".to_string(), keyed("sk-or-fallback"));

        let (config, spec) = match_provider("some-unknown-model", &providers).unwrap();
        assert_eq!(spec.name, "openrouter");
        assert_eq!(config.api_key, "sk-or-fallback");
    }

    #[test]
    fn test_match_provider_local_fallback() {
        let mut providers = HashMap::new();
        providers.insert(
            "vllm".to_string(),
            ProviderConfig {
                api_base: Some("http://gpu-box:8000/v1".to_string()),
                ..Default::default()
            },
        );

        let (_, spec) = match_provider("my-finetune", &providers).unwrap();
        assert_eq!(spec.name, "vllm");
    }

    #[test]
    fn test_match_provider_no_key() {
        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), keyed(""));
        assert!(match_provider("gpt-4o", &providers).is_none());
    }

    #[test]
    fn test_all_providers_have_unique_names() {
        let names: Vec<&str> = PROVIDERS.iter().map(|s| s.name).collect();
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(names.len(), unique.len(), "Duplicate provider names found");
    }

    #[test]
    fn test_every_config_section_has_a_spec() {
        let config = teabot_core::config::schema::ProvidersConfig::default();
        for name in config.to_map().keys() {
            assert!(find_by_name(name).is_some(), "no spec for {name}");
        }
    }
}
