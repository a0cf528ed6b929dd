//! Generic HTTP-based completion provider for OpenAI-compatible APIs.
//!
//! Talks directly to any `/chat/completions` endpoint: OpenAI, OpenRouter,
//! DeepSeek, Groq, GigaChat, and self-hosted vLLM. GigaChat keys are traded
//! for access tokens first (see [`crate::oauth`]).

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use tracing::{debug, error, warn};

use teabot_core::types::{ChatCompletionRequest, ChatCompletionResponse, Message};

use crate::oauth::TokenSource;
use crate::registry::{resolve_model_name, AuthScheme, ProviderConfig, ProviderSpec};
use crate::traits::{LlmProvider, LlmRequestConfig, ProviderError};

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// A completion provider that talks to any OpenAI-compatible HTTP API.
///
/// The rendered prompt is sent as a single user message; the first choice's
/// text is returned.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    api_base: String,
    /// API key for Bearer authentication. Empty means no auth header.
    api_key: String,
    /// Model as configured (routing id).
    default_model: String,
    /// Extra headers to send with each request.
    extra_headers: HeaderMap,
    /// Set when the key must be exchanged for access tokens.
    oauth: Option<TokenSource>,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .field("provider", &self.spec.display_name)
            .finish()
    }
}

impl HttpProvider {
    /// Create a new HttpProvider from a provider config and spec.
    ///
    /// The API base comes from config, falling back to the spec default.
    pub fn new(
        config: &ProviderConfig,
        spec: &'static ProviderSpec,
        model: &str,
    ) -> Result<Self, ProviderError> {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| spec.default_api_base.to_string());

        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = config.extra_headers {
            for (key, value) in headers {
                if let (Ok(name), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(name, val);
                } else {
                    warn!("Invalid header: {}={}", key, value);
                }
            }
        }

        // The agent loop enforces its own per-call deadline; this is only a
        // backstop for stuck connections.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(ProviderError::Client)?;

        let oauth = match spec.auth {
            AuthScheme::OAuth {
                token_url,
                default_scope,
            } if config.is_configured() => Some(TokenSource::new(
                spec.display_name,
                config.auth_url.as_deref().unwrap_or(token_url),
                config.api_key.as_str(),
                config.scope.as_deref().unwrap_or(default_scope),
            )),
            _ => None,
        };

        Ok(HttpProvider {
            client,
            api_base,
            api_key: config.api_key.clone(),
            default_model: model.to_string(),
            extra_headers,
            oauth,
            spec,
        })
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    fn provider_name(&self) -> String {
        self.spec.display_name.to_string()
    }

    /// POST one chat request with whatever credential the provider uses.
    async fn send(
        &self,
        body: &ChatCompletionRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut request = self
            .client
            .post(self.completions_url())
            .headers(self.extra_headers.clone())
            .json(body);
        match &self.oauth {
            Some(oauth) => request = request.bearer_auth(oauth.token(&self.client).await?),
            None if !self.api_key.is_empty() => request = request.bearer_auth(&self.api_key),
            None => {}
        }

        request.send().await.map_err(|e| {
            error!(provider = self.spec.display_name, error = %e, "HTTP request failed");
            ProviderError::Request {
                provider: self.provider_name(),
                source: e,
            }
        })
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn complete(
        &self,
        prompt: &str,
        config: &LlmRequestConfig,
    ) -> Result<String, ProviderError> {
        let resolved_model = resolve_model_name(&self.default_model, self.spec);

        debug!(
            provider = self.spec.display_name,
            model = %resolved_model,
            prompt_chars = prompt.chars().count(),
            "Calling LLM"
        );

        let request_body = ChatCompletionRequest {
            model: resolved_model,
            messages: vec![Message::user(prompt)],
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
            stop: config.stop.clone(),
        };

        let mut response = self.send(&request_body).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(oauth) = &self.oauth {
                warn!(
                    provider = self.spec.display_name,
                    "access token rejected, refreshing"
                );
                oauth.invalidate().await;
                response = self.send(&request_body).await?;
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(
                provider = self.spec.display_name,
                status = %status,
                body = %body,
                "API error"
            );
            return Err(ProviderError::Status {
                provider: self.provider_name(),
                status: status.as_u16(),
                body,
            });
        }

        let chat_resp = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| {
                error!(
                    provider = self.spec.display_name,
                    error = %e,
                    "Failed to parse LLM response"
                );
                ProviderError::InvalidResponse {
                    provider: self.provider_name(),
                    source: e,
                }
            })?;

        if let Some(usage) = &chat_resp.usage {
            debug!(
                provider = self.spec.display_name,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "LLM response received"
            );
        }

        chat_resp
            .into_text()
            .ok_or_else(|| ProviderError::EmptyCompletion {
                provider: self.provider_name(),
            })
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn display_name(&self) -> &str {
        self.spec.display_name
    }
}

// ─────────────────────────────────────────────
// Builder (convenience)
// ─────────────────────────────────────────────

/// Build an HttpProvider from a model name and a map of provider configs.
///
/// Matches the model to a provider, reads its config, and creates the client.
pub fn create_provider(
    model: &str,
    providers: &HashMap<String, ProviderConfig>,
) -> Result<HttpProvider, ProviderError> {
    let (config, spec) = crate::registry::match_provider(model, providers)
        .ok_or_else(|| ProviderError::NotConfigured(model.to_string()))?;

    debug!(
        provider = spec.display_name,
        model = model,
        api_base = config.api_base.as_deref().unwrap_or("default"),
        "Creating LLM provider"
    );

    HttpProvider::new(config, spec, model)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
