//! Agent loop — the prompt → completion → parse → dispatch state machine.
//!
//! One invocation answers one user message for one session:
//!
//! ```text
//! Running(n) ──Finish──────────────▶ Finished(answer)   memory += (user, agent)
//!     │
//!     ├──Action / ParseError──▶ Running(n + 1)  while n + 1 < max_iterations
//!     │                      └▶ Aborted(budget exhausted)
//!     └──timeout / provider failure──▶ Aborted(...)
//! ```
//!
//! The session's lock is held for the whole invocation, so invocations for
//! the same session run one after another while different sessions proceed
//! in parallel. Memory and the transcript are only written on `Finished`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use teabot_core::config::schema::{AgentConfig, MAX_ITERATIONS_LIMIT};
use teabot_core::session::SessionManager;
use teabot_core::transcript::Transcript;
use teabot_core::types::ConversationTurn;
use teabot_core::utils::truncate_string;
use teabot_providers::{LlmProvider, LlmRequestConfig};

use crate::parser::{self, AgentAction, Instruction, INVALID_FORMAT_OBSERVATION};
use crate::prompt::{self, PromptTemplate};
use crate::scratchpad::{Scratchpad, EXCEPTION_TOOL};
use crate::tools::ToolRegistry;

/// Answer given when the budget runs out and no tool produced anything.
pub const FALLBACK_ANSWER: &str =
    "Sorry, I couldn't find an answer to your question. Please try rephrasing it.";

/// Answer given when the model could not be reached.
pub const APOLOGY_ANSWER: &str =
    "Sorry, something went wrong while preparing the answer. Please try again later.";

// ─────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────

/// Per-agent knobs, fixed at construction.
#[derive(Clone, Debug)]
pub struct AgentSettings {
    /// Completion calls allowed per invocation (clamped to `1..=10`).
    pub max_iterations: u32,
    /// Deadline for one completion call.
    pub completion_timeout: Duration,
    /// Number of most recent turns rendered into `{history}`.
    pub history_limit: usize,
    pub request: LlmRequestConfig,
}

impl AgentSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.effective_max_iterations(),
            completion_timeout: Duration::from_secs(config.completion_timeout_secs),
            history_limit: config.history_limit,
            request: LlmRequestConfig {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                stop: vec!["\nObservation:".to_string()],
            },
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

// ─────────────────────────────────────────────
// States and outcomes
// ─────────────────────────────────────────────

/// Why an invocation ended without a final answer from the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbortReason {
    BudgetExhausted,
    CompletionTimeout,
    CompletionFailed(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::BudgetExhausted => f.write_str("iteration budget exhausted"),
            AbortReason::CompletionTimeout => f.write_str("completion timed out"),
            AbortReason::CompletionFailed(msg) => write!(f, "completion failed: {msg}"),
        }
    }
}

#[derive(Debug)]
enum LoopState {
    Running(u32),
    Finished(String),
    Aborted(AbortReason),
}

/// Result of one invocation. Both variants carry an answer for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentOutcome {
    Finished {
        answer: String,
        iterations: u32,
    },
    Aborted {
        answer: String,
        reason: AbortReason,
        iterations: u32,
    },
}

impl AgentOutcome {
    pub fn answer(&self) -> &str {
        match self {
            AgentOutcome::Finished { answer, .. } | AgentOutcome::Aborted { answer, .. } => answer,
        }
    }

    pub fn into_answer(self) -> String {
        match self {
            AgentOutcome::Finished { answer, .. } | AgentOutcome::Aborted { answer, .. } => answer,
        }
    }
}

/// The only failures surfaced to callers; everything else becomes an answer.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent invocation was cancelled")]
    Cancelled,

    #[error("failed to persist session '{key}': {source}")]
    Session {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

// ─────────────────────────────────────────────
// AgentLoop
// ─────────────────────────────────────────────

/// Drives invocations. Cheap to share: everything inside is immutable or
/// internally synchronized.
pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    template: Arc<PromptTemplate>,
    sessions: Arc<SessionManager>,
    transcript: Option<Arc<Transcript>>,
    settings: AgentSettings,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        sessions: Arc<SessionManager>,
        mut settings: AgentSettings,
    ) -> Self {
        settings.max_iterations = settings.max_iterations.clamp(1, MAX_ITERATIONS_LIMIT);

        info!(
            provider = provider.display_name(),
            model = provider.default_model(),
            tools = tools.len(),
            max_iterations = settings.max_iterations,
            "agent loop initialized"
        );

        Self {
            provider,
            tools: Arc::new(tools),
            template: Arc::new(PromptTemplate::default()),
            sessions,
            transcript: None,
            settings,
        }
    }

    /// Use a custom prompt template instead of the built-in one.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = Arc::new(template);
        self
    }

    /// Log every finished exchange to a transcript file.
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(Arc::new(transcript));
        self
    }

    /// Answer one message for one session.
    ///
    /// Returns `Err` only when `cancel` fires or the session cannot be
    /// persisted; model and tool failures still produce an answer.
    pub async fn process(
        &self,
        session_key: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome, AgentError> {
        let handle = self.sessions.handle(session_key);
        let mut session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            guard = handle.lock() => guard,
        };

        info!(
            session = session_key,
            input = %truncate_string(input, 80),
            "processing message"
        );

        let history = session.history(self.settings.history_limit).to_vec();
        let mut scratchpad = Scratchpad::new();
        let mut state = LoopState::Running(0);
        let mut calls = 0u32;

        let outcome = loop {
            match state {
                LoopState::Running(n) => {
                    calls += 1;
                    state = self
                        .step(n, &history, &mut scratchpad, input, cancel)
                        .await?;
                }
                LoopState::Finished(answer) => {
                    break AgentOutcome::Finished {
                        answer,
                        iterations: calls,
                    };
                }
                LoopState::Aborted(reason) => {
                    let answer = match reason {
                        AbortReason::BudgetExhausted => scratchpad
                            .last_observation()
                            .unwrap_or(FALLBACK_ANSWER)
                            .to_string(),
                        _ => APOLOGY_ANSWER.to_string(),
                    };
                    warn!(session = session_key, reason = %reason, "invocation aborted");
                    break AgentOutcome::Aborted {
                        answer,
                        reason,
                        iterations: calls,
                    };
                }
            }
        };

        if let AgentOutcome::Finished { answer, iterations } = &outcome {
            // Memory only keeps the pair once it is on disk.
            let committed = session.turns.len();
            session.push(ConversationTurn::user(input));
            session.push(ConversationTurn::agent(answer.as_str()));
            if let Err(source) = self.sessions.persist(&session) {
                session.turns.truncate(committed);
                return Err(AgentError::Session {
                    key: session_key.to_string(),
                    source,
                });
            }

            if let Some(transcript) = &self.transcript {
                if let Err(e) = transcript.append(input, answer).await {
                    warn!(error = %e, "failed to append to transcript");
                }
            }

            info!(
                session = session_key,
                iterations = *iterations,
                answer = %truncate_string(answer, 120),
                "message answered"
            );
        }

        Ok(outcome)
    }

    /// Answer one message without external cancellation (CLI entry point).
    pub async fn process_direct(&self, session_key: &str, input: &str) -> Result<String, AgentError> {
        let outcome = self
            .process(session_key, input, &CancellationToken::new())
            .await?;
        Ok(outcome.into_answer())
    }

    /// One transition out of `Running(n)`.
    async fn step(
        &self,
        n: u32,
        history: &[ConversationTurn],
        scratchpad: &mut Scratchpad,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<LoopState, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let prompt = prompt::build(&self.template, &self.tools, history, scratchpad, input);
        debug!(iteration = n, prompt_chars = prompt.chars().count(), "calling model");

        let completion = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            res = tokio::time::timeout(
                self.settings.completion_timeout,
                self.provider.complete(&prompt, &self.settings.request),
            ) => res,
        };

        let raw = match completion {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(iteration = n, error = %e, "completion failed");
                return Ok(LoopState::Aborted(AbortReason::CompletionFailed(e.to_string())));
            }
            Err(_) => {
                warn!(
                    iteration = n,
                    timeout_secs = self.settings.completion_timeout.as_secs_f64(),
                    "completion timed out"
                );
                return Ok(LoopState::Aborted(AbortReason::CompletionTimeout));
            }
        };

        match parser::parse(&raw) {
            Instruction::Finish { answer } => Ok(LoopState::Finished(answer)),
            Instruction::Action(action) => {
                debug!(iteration = n, tool = %action.tool, "model requested tool");
                let observation = self.tools.dispatch(&action).await;
                scratchpad.push(action, observation);
                Ok(self.advance(n))
            }
            Instruction::ParseError { raw_text, reason } => {
                warn!(
                    iteration = n,
                    reason = %reason,
                    raw = %truncate_string(&raw_text, 120),
                    "unparsable model reply"
                );
                scratchpad.push(
                    AgentAction::new(EXCEPTION_TOOL, reason),
                    INVALID_FORMAT_OBSERVATION,
                );
                Ok(self.advance(n))
            }
        }
    }

    fn advance(&self, n: u32) -> LoopState {
        let next = n + 1;
        if next >= self.settings.max_iterations {
            LoopState::Aborted(AbortReason::BudgetExhausted)
        } else {
            LoopState::Running(next)
        }
    }

    /// Get a reference to the tool registry.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        self.provider.default_model()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::JsonSearchTool;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use teabot_core::session::MAX_PERSISTED_KEY_LEN;
    use teabot_core::types::Role;
    use teabot_providers::ProviderError;

    enum Script {
        Reply(&'static str),
        Fail,
        Hang,
        /// Yield, then answer whatever question the prompt ends with.
        Echo,
    }

    fn asked_question(prompt: &str) -> &str {
        let start = prompt.rfind("Question: ").map_or(0, |i| i + "Question: ".len());
        prompt[start..].lines().next().unwrap_or_default()
    }

    /// A mock provider that plays back scripted replies and records prompts.
    struct MockProvider {
        script: std::sync::Mutex<Vec<Script>>,
        prompts: std::sync::Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                script: std::sync::Mutex::new(script),
                prompts: std::sync::Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn replies(replies: &[&'static str]) -> Arc<Self> {
            Self::new(replies.iter().map(|r| Script::Reply(*r)).collect())
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn prompt(&self, idx: usize) -> String {
            self.prompts.lock().unwrap()[idx].clone()
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn complete(
            &self,
            prompt: &str,
            _config: &LlmRequestConfig,
        ) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    Script::Reply("Final Answer: (no more responses)")
                } else {
                    script.remove(0)
                }
            };
            match next {
                Script::Reply(text) => Ok(text.to_string()),
                Script::Fail => Err(ProviderError::Status {
                    provider: "Mock".into(),
                    status: 500,
                    body: "boom".into(),
                }),
                Script::Hang => std::future::pending().await,
                Script::Echo => {
                    for _ in 0..3 {
                        tokio::task::yield_now().await;
                    }
                    Ok(format!("Final Answer: answer to {}", asked_question(prompt)))
                }
            }
        }

        fn default_model(&self) -> &str {
            "mock-model"
        }

        fn display_name(&self) -> &str {
            "MockProvider"
        }
    }

    fn catalog() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data = serde_json::json!([
            { "name": "Earl Grey", "price": "200" },
            { "name": "Green Tea", "price": "180" }
        ]);
        file.write_all(data.to_string().as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn create_test_loop(
        provider: Arc<MockProvider>,
        catalog: &tempfile::NamedTempFile,
        max_iterations: u32,
    ) -> AgentLoop {
        let mut tools = ToolRegistry::new();
        tools
            .register(Arc::new(JsonSearchTool::product_search(catalog.path())))
            .unwrap();
        let settings = AgentSettings {
            max_iterations,
            completion_timeout: Duration::from_millis(200),
            ..AgentSettings::default()
        };
        AgentLoop::new(
            provider,
            tools,
            Arc::new(SessionManager::in_memory(16)),
            settings,
        )
    }

    #[tokio::test]
    async fn test_finish_strips_thought() {
        let file = catalog();
        let provider = MockProvider::replies(&["Thought: ok\nFinal Answer: Hello"]);
        let agent = create_test_loop(provider.clone(), &file, 5);

        let outcome = agent
            .process("s", "Hi", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AgentOutcome::Finished {
                answer: "Hello".into(),
                iterations: 1
            }
        );

        let history = agent.sessions().history("s", 10).await;
        assert_eq!(
            history,
            vec![ConversationTurn::user("Hi"), ConversationTurn::agent("Hello")]
        );
    }

    #[tokio::test]
    async fn test_tool_call_then_finish() {
        let file = catalog();
        let provider = MockProvider::replies(&[
            "Thought: look it up\nAction: product_search\nAction Input: grey",
            "Final Answer: Earl Grey costs 200.",
        ]);
        let agent = create_test_loop(provider.clone(), &file, 5);

        let answer = agent.process_direct("s", "How much is Earl Grey?").await.unwrap();
        assert_eq!(answer, "Earl Grey costs 200.");
        assert_eq!(provider.calls(), 2);

        let second = provider.prompt(1);
        assert!(second.contains(
            "Action: product_search\nAction Input: grey\nObservation: [doc 1] name: Earl Grey\nprice: 200\n"
        ));
        assert!(!provider.prompt(0).contains("Observation: [doc"));
    }

    #[tokio::test]
    async fn test_budget_stops_before_third_call() {
        let file = catalog();
        let provider = MockProvider::replies(&[
            "Action: product_search\nAction Input: grey",
            "Action: product_search\nAction Input: oolong",
            "Final Answer: never reached",
        ]);
        let agent = create_test_loop(provider.clone(), &file, 2);

        let outcome = agent
            .process("s", "tea?", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(provider.calls(), 2);
        assert_eq!(
            outcome,
            AgentOutcome::Aborted {
                answer: "[doc 1] name: Earl Grey\nprice: 200".into(),
                reason: AbortReason::BudgetExhausted,
                iterations: 2
            }
        );
        assert!(agent.sessions().history("s", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_budget_fallback_without_observations() {
        let file = catalog();
        let provider = MockProvider::replies(&["Action: product_search\nAction Input: oolong"]);
        let agent = create_test_loop(provider.clone(), &file, 1);

        let answer = agent.process_direct("s", "oolong?").await.unwrap();
        assert_eq!(answer, FALLBACK_ANSWER);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_max_iterations_clamped() {
        let file = catalog();
        let agent = create_test_loop(MockProvider::replies(&[]), &file, 0);
        assert_eq!(agent.settings().max_iterations, 1);

        let agent = create_test_loop(MockProvider::replies(&[]), &file, 99);
        assert_eq!(agent.settings().max_iterations, MAX_ITERATIONS_LIMIT);
    }

    #[tokio::test]
    async fn test_parse_error_gets_corrective_observation() {
        let file = catalog();
        let provider = MockProvider::replies(&["Action: product_search", "Final Answer: ok"]);
        let agent = create_test_loop(provider.clone(), &file, 5);

        let answer = agent.process_direct("s", "hi").await.unwrap();
        assert_eq!(answer, "ok");

        let second = provider.prompt(1);
        assert!(second.contains("Action: _Exception"));
        assert!(second.contains(&format!("Observation: {INVALID_FORMAT_OBSERVATION}")));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_observation() {
        let file = catalog();
        let provider = MockProvider::replies(&[
            "Action: web_search\nAction Input: tea",
            "Final Answer: sorry",
        ]);
        let agent = create_test_loop(provider.clone(), &file, 5);

        agent.process_direct("s", "hi").await.unwrap();
        assert!(provider
            .prompt(1)
            .contains("Observation: web_search is not a valid tool, try one of [product_search]."));
    }

    #[tokio::test]
    async fn test_timeout_aborts_without_memory_write() {
        let file = catalog();
        let provider = MockProvider::new(vec![Script::Hang]);
        let agent = create_test_loop(provider.clone(), &file, 5);

        let outcome = agent
            .process("s", "hi", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AgentOutcome::Aborted {
                answer: APOLOGY_ANSWER.into(),
                reason: AbortReason::CompletionTimeout,
                iterations: 1
            }
        );
        assert!(agent.sessions().history("s", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_aborts() {
        let file = catalog();
        let provider = MockProvider::new(vec![Script::Fail]);
        let agent = create_test_loop(provider.clone(), &file, 5);

        let outcome = agent
            .process("s", "hi", &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            AgentOutcome::Aborted {
                reason: AbortReason::CompletionFailed(_),
                ..
            }
        ));
        assert_eq!(outcome.answer(), APOLOGY_ANSWER);
        assert!(agent.sessions().history("s", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let file = catalog();
        let provider = MockProvider::replies(&["Final Answer: hi"]);
        let agent = create_test_loop(provider.clone(), &file, 5);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = agent.process("s", "hi", &cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_completion() {
        let file = catalog();
        let provider = MockProvider::new(vec![Script::Hang]);
        let mut agent = create_test_loop(provider.clone(), &file, 5);
        agent.settings.completion_timeout = Duration::from_secs(30);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = agent.process("s", "hi", &cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert!(agent.sessions().history("s", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let file = catalog();
        let provider = MockProvider::replies(&["Final Answer: one", "Final Answer: two"]);
        let agent = create_test_loop(provider.clone(), &file, 5);

        agent.process_direct("a", "secret from A").await.unwrap();
        agent.process_direct("b", "hello from B").await.unwrap();

        assert!(provider.prompt(0).contains("secret from A"));
        assert!(!provider.prompt(1).contains("secret from A"));
        assert_eq!(agent.sessions().history("a", 10).await.len(), 2);
        assert_eq!(agent.sessions().history("b", 10).await.len(), 2);
    }

    #[tokio::test]
    async fn test_history_rendered_on_next_turn() {
        let file = catalog();
        let provider = MockProvider::replies(&["Final Answer: Hello!", "Final Answer: Bye"]);
        let agent = create_test_loop(provider.clone(), &file, 5);

        agent.process_direct("s", "Hi").await.unwrap();
        agent.process_direct("s", "Bye").await.unwrap();

        assert!(provider.prompt(1).contains("Human: Hi\nAI: Hello!"));
    }

    #[tokio::test]
    async fn test_transcript_only_logs_finished() {
        let file = catalog();
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("conversation_log.json");

        let provider = MockProvider::new(vec![Script::Fail, Script::Reply("Final Answer: 200")]);
        let agent = create_test_loop(provider, &file, 5).with_transcript(Transcript::new(&log_path));

        agent.process_direct("s", "first").await.unwrap();
        agent.process_direct("s", "price?").await.unwrap();

        let entries = Transcript::new(&log_path).entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].question, "price?");
        assert_eq!(entries[0].answer, "200");
    }

    #[tokio::test]
    async fn test_custom_template() {
        let file = catalog();
        let provider = MockProvider::replies(&["Final Answer: ok"]);
        let template = PromptTemplate::new("Q={input};S={agent_scratchpad}").unwrap();
        let agent = create_test_loop(provider.clone(), &file, 5).with_template(template);

        agent.process_direct("s", "tea").await.unwrap();
        assert_eq!(provider.prompt(0), "Q=tea;S=");
    }

    #[tokio::test]
    async fn test_concurrent_runs_on_one_session_stay_paired() {
        let file = catalog();
        let runs = 8;
        let provider = MockProvider::new((0..runs).map(|_| Script::Echo).collect());
        let agent = Arc::new(create_test_loop(provider.clone(), &file, 5));

        let mut tasks = Vec::new();
        for i in 0..runs {
            let agent = agent.clone();
            tasks.push(tokio::spawn(async move {
                agent
                    .process("same", &format!("q{i}"), &CancellationToken::new())
                    .await
            }));
        }
        for task in tasks {
            let outcome = task.await.unwrap().unwrap();
            assert!(outcome.answer().starts_with("answer to q"));
        }

        let history = agent.sessions().history("same", 100).await;
        assert_eq!(history.len(), runs * 2);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Agent);
            assert_eq!(pair[1].text, format!("answer to {}", pair[0].text));
        }

        assert_eq!(provider.calls(), runs);
        for idx in 1..runs {
            let previous = provider.prompt(idx - 1);
            let asked = asked_question(&previous);
            assert!(provider
                .prompt(idx)
                .contains(&format!("Human: {asked}\nAI: answer to {asked}")));
        }
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = Arc::new(SessionManager::new(8, Some(dir.path().to_path_buf())).unwrap());
        let provider = MockProvider::replies(&["Final Answer: saved?"]);
        let agent = AgentLoop::new(provider, ToolRegistry::new(), sessions, AgentSettings::default());
        let key = "k".repeat(MAX_PERSISTED_KEY_LEN + 1);

        let err = agent.process_direct(&key, "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::Session { .. }));
        assert!(agent.sessions().history(&key, 10).await.is_empty());
    }
}
