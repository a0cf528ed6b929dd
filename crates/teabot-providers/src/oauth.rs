//! OAuth access tokens for providers that do not accept the API key
//! directly (GigaChat).
//!
//! The configured key is a Basic credential. It is posted to the token
//! endpoint together with a scope and a fresh `RqUID`; the endpoint answers
//! `{"access_token": "...", "expires_at": <unix ms>}`. Tokens are cached and
//! refreshed shortly before they expire.

use chrono::Utc;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

use crate::traits::ProviderError;

/// Tokens this close to expiry are treated as expired.
const REFRESH_MARGIN_MS: i64 = 60_000;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Unix time in milliseconds.
    expires_at: i64,
}

#[derive(Clone, Debug)]
struct AccessToken {
    value: String,
    expires_at_ms: i64,
}

impl AccessToken {
    fn is_fresh(&self, now_ms: i64) -> bool {
        self.expires_at_ms - now_ms > REFRESH_MARGIN_MS
    }
}

/// Hands out a valid access token, fetching a new one when needed.
///
/// Refreshes are serialized, so concurrent callers share one exchange.
#[derive(Debug)]
pub struct TokenSource {
    provider: &'static str,
    token_url: String,
    credentials: String,
    scope: String,
    cache: Mutex<Option<AccessToken>>,
}

impl TokenSource {
    pub fn new(
        provider: &'static str,
        token_url: impl Into<String>,
        credentials: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            token_url: token_url.into(),
            credentials: credentials.into(),
            scope: scope.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// A token valid for at least the refresh margin.
    pub async fn token(&self, client: &reqwest::Client) -> Result<String, ProviderError> {
        let mut cache = self.cache.lock().await;
        let now_ms = Utc::now().timestamp_millis();
        if let Some(token) = cache.as_ref().filter(|t| t.is_fresh(now_ms)) {
            return Ok(token.value.clone());
        }

        let token = self.fetch(client).await?;
        let value = token.value.clone();
        *cache = Some(token);
        Ok(value)
    }

    /// Forget the cached token, e.g. after the API rejected it.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    async fn fetch(&self, client: &reqwest::Client) -> Result<AccessToken, ProviderError> {
        debug!(provider = self.provider, url = %self.token_url, "requesting access token");

        let response = client
            .post(&self.token_url)
            .header(AUTHORIZATION, format!("Basic {}", self.credentials))
            .header(ACCEPT, "application/json")
            .header("RqUID", Uuid::new_v4().to_string())
            .form(&[("scope", self.scope.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!(provider = self.provider, error = %e, "token request failed");
                ProviderError::Request {
                    provider: self.provider.to_string(),
                    source: e,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = self.provider, status = %status, body = %body, "token request rejected");
            return Err(ProviderError::Auth {
                provider: self.provider.to_string(),
                reason: format!("token endpoint returned {status}: {body}"),
            });
        }

        let parsed = response.json::<TokenResponse>().await.map_err(|e| {
            ProviderError::InvalidResponse {
                provider: self.provider.to_string(),
                source: e,
            }
        })?;

        debug!(
            provider = self.provider,
            expires_at = parsed.expires_at,
            "access token received"
        );
        Ok(AccessToken {
            value: parsed.access_token,
            expires_at_ms: parsed.expires_at,
        })
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
