//! `teabot serve` — the HTTP boundary.
//!
//! - `POST /bot` `{"message": "...", "session_id": "..."}` → `{"response": "..."}`
//! - `GET /health` → `{"status": "ok"}`
//!
//! The session is taken from the `X-Session-ID` header, then the body's
//! `session_id`, then `"http:default"`. Ctrl+C cancels in-flight runs and
//! stops accepting connections.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use teabot_agent::agent_loop::APOLOGY_ANSWER;
use teabot_agent::{AgentError, AgentLoop};
use teabot_core::config::Config;

use crate::helpers;

pub const SESSION_HEADER: &str = "x-session-id";
pub const DEFAULT_SESSION: &str = "http:default";
const EMPTY_MESSAGE_REPLY: &str = "Please send a message.";
const SHUTTING_DOWN_REPLY: &str = "The assistant is shutting down, please try again later.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BotRequest {
    pub message: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BotResponse {
    pub response: String,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<AgentLoop>,
    shutdown: CancellationToken,
}

/// Build the router. Cancelling `shutdown` cancels every in-flight run.
pub fn router(agent: Arc<AgentLoop>, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/bot", post(bot))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { agent, shutdown })
}

/// Bind, serve until Ctrl+C, then drain.
pub async fn run(config: Config) -> Result<()> {
    let agent = Arc::new(crate::build_agent_loop(&config)?);
    let shutdown = CancellationToken::new();
    let app = router(agent.clone(), shutdown.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    helpers::print_banner();
    println!("  Model:     {}", agent.model());
    println!("  Tools:     {}", agent.tools().tool_names().join(", "));
    println!("  Listening: http://{addr}");
    println!();
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            shutdown.cancel();
        })
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

// ─────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn bot(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<BotRequest>, JsonRejection>,
) -> (StatusCode, Json<BotResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection, "rejected /bot body");
            BotRequest::default()
        }
    };

    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());
    let Some(message) = message else {
        return reply(StatusCode::BAD_REQUEST, EMPTY_MESSAGE_REPLY);
    };

    let session_key = session_key(&headers, request.session_id.as_deref());
    let cancel = state.shutdown.child_token();

    match state.agent.process(&session_key, message, &cancel).await {
        Ok(outcome) => reply(StatusCode::OK, outcome.answer()),
        Err(AgentError::Cancelled) => reply(StatusCode::SERVICE_UNAVAILABLE, SHUTTING_DOWN_REPLY),
        Err(e) => {
            error!(session = %session_key, error = %e, "agent run failed");
            reply(StatusCode::INTERNAL_SERVER_ERROR, APOLOGY_ANSWER)
        }
    }
}

fn session_key(headers: &HeaderMap, body_session: Option<&str>) -> String {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(non_empty)
        .or_else(|| body_session.and_then(non_empty))
        .unwrap_or_else(|| DEFAULT_SESSION.to_string())
}

fn reply(status: StatusCode, text: &str) -> (StatusCode, Json<BotResponse>) {
    (
        status,
        Json(BotResponse {
            response: text.to_string(),
        }),
    )
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use teabot_agent::{AgentSettings, ToolRegistry};
    use teabot_core::session::SessionManager;
    use teabot_providers::{LlmProvider, LlmRequestConfig, ProviderError};
    use tower::ServiceExt;

    /// Answers every prompt with a fixed final answer.
    struct FixedProvider;

    #[async_trait]
    impl LlmProvider for FixedProvider {
        async fn complete(
            &self,
            _prompt: &str,
            _config: &LlmRequestConfig,
        ) -> Result<String, ProviderError> {
            Ok("Thought: easy\nFinal Answer: We sell tea.".to_string())
        }

        fn default_model(&self) -> &str {
            "fixed"
        }

        fn display_name(&self) -> &str {
            "Fixed"
        }
    }

    fn test_agent() -> Arc<AgentLoop> {
        Arc::new(AgentLoop::new(
            Arc::new(FixedProvider),
            ToolRegistry::new(),
            Arc::new(SessionManager::in_memory(8)),
            AgentSettings::default(),
        ))
    }

    fn post_bot(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/bot")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(test_agent(), CancellationToken::new());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_bot_answers() {
        let agent = test_agent();
        let app = router(agent.clone(), CancellationToken::new());
        let response = app
            .oneshot(post_bot(r#"{"message": "What do you sell?"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await,
            json!({ "response": "We sell tea." })
        );
        assert_eq!(agent.sessions().history(DEFAULT_SESSION, 10).await.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_message_is_bad_request() {
        for body in [r#"{"message": "   "}"#, r#"{}"#, "not json"] {
            let app = router(test_agent(), CancellationToken::new());
            let response = app.oneshot(post_bot(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                read_json(response).await,
                json!({ "response": "Please send a message." })
            );
        }
    }

    #[tokio::test]
    async fn test_session_header_wins_over_body() {
        let agent = test_agent();
        let app = router(agent.clone(), CancellationToken::new());
        let request = Request::builder()
            .method("POST")
            .uri("/bot")
            .header("content-type", "application/json")
            .header("X-Session-ID", "from-header")
            .body(Body::from(r#"{"message": "hi", "session_id": "from-body"}"#))
            .unwrap();
        app.oneshot(request).await.unwrap();

        assert_eq!(agent.sessions().history("from-header", 10).await.len(), 2);
        assert!(agent.sessions().history("from-body", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_body_session_used_without_header() {
        let agent = test_agent();
        let app = router(agent.clone(), CancellationToken::new());
        app.oneshot(post_bot(r#"{"message": "hi", "session_id": "web-42"}"#))
            .await
            .unwrap();
        assert_eq!(agent.sessions().history("web-42", 10).await.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_runs() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let agent = test_agent();
        let app = router(agent.clone(), shutdown);
        let response = app.oneshot(post_bot(r#"{"message": "hi"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(agent.sessions().history(DEFAULT_SESSION, 10).await.is_empty());
    }

    #[test]
    fn test_session_key_fallbacks() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_key(&headers, None), DEFAULT_SESSION);
        assert_eq!(session_key(&headers, Some(" ")), DEFAULT_SESSION);
        assert_eq!(session_key(&headers, Some("b")), "b");
        headers.insert(SESSION_HEADER, " ".parse().unwrap());
        assert_eq!(session_key(&headers, Some("b")), "b");
        headers.insert(SESSION_HEADER, "h".parse().unwrap());
        assert_eq!(session_key(&headers, Some("b")), "h");
    }
}
