// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! The agentic conversation loop
//!
//! One user submission drives an exchange: stream the model's reply, run
//! any requested tools concurrently, feed their results back, and repeat
//! until the model answers without calling a tool. Model-call failures
//! rotate to the next credential and rebuild the session from the history
//! gathered so far. Cancellation is cooperative and never rolls back tool
//! effects.

use base64::Engine as _;
use futures::StreamExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Settings;
use crate::error::{KilnError, Result};
use crate::llm::credentials::CredentialRotator;
use crate::llm::message::{FunctionCall, InlineData, Part, Role, Turn};
use crate::llm::provider::{ChunkStream, LlmProvider};
use crate::llm::rate_limit::{display_secs, RateLimiter};
use crate::store::{KEY_API_KEYS, KEY_ROOT_DIRECTORY};
use crate::tools::project::{FsProjectTree, ProjectTree};
use crate::tools::{ToolContext, ToolExecutor, ToolRegistry, ToolResult};

use super::prompts::CONDENSE_PROMPT;
use super::session::{AgentMode, SessionManager};
use super::streaming::StreamAccumulator;

pub const CANCELLED_MESSAGE: &str = "Cancelled by user.";
pub const EXHAUSTED_MESSAGE: &str = "All API keys failed. Please check your keys in the settings.";

/// States of one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    RateLimitWait,
    Sending,
    StreamingResponse,
    ExecutingTools,
    CredentialFailure,
    Cancelled,
}

impl ExchangeState {
    /// Every legal transition
    pub const TRANSITIONS: &'static [(ExchangeState, ExchangeState)] = &[
        (ExchangeState::Idle, ExchangeState::RateLimitWait),
        (ExchangeState::RateLimitWait, ExchangeState::Sending),
        (ExchangeState::RateLimitWait, ExchangeState::Cancelled),
        (ExchangeState::RateLimitWait, ExchangeState::Idle),
        (ExchangeState::Sending, ExchangeState::StreamingResponse),
        (ExchangeState::Sending, ExchangeState::CredentialFailure),
        (ExchangeState::Sending, ExchangeState::Cancelled),
        (ExchangeState::Sending, ExchangeState::Idle),
        (ExchangeState::StreamingResponse, ExchangeState::ExecutingTools),
        (ExchangeState::StreamingResponse, ExchangeState::CredentialFailure),
        (ExchangeState::StreamingResponse, ExchangeState::Cancelled),
        (ExchangeState::StreamingResponse, ExchangeState::Idle),
        (ExchangeState::ExecutingTools, ExchangeState::Sending),
        (ExchangeState::ExecutingTools, ExchangeState::Cancelled),
        (ExchangeState::CredentialFailure, ExchangeState::Sending),
        (ExchangeState::CredentialFailure, ExchangeState::Cancelled),
        (ExchangeState::CredentialFailure, ExchangeState::Idle),
        (ExchangeState::Cancelled, ExchangeState::Idle),
    ];

    pub fn can_transition_to(self, next: ExchangeState) -> bool {
        Self::TRANSITIONS.contains(&(self, next))
    }
}

/// How an exchange ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The model answered without calling a tool
    Completed { text: String, rounds: usize },
    Cancelled,
    CredentialsExhausted,
    /// The session could not be (re)built
    SessionFailed(String),
    /// A failure that another credential would not fix
    Failed(String),
    /// Nothing to send
    Ignored,
}

/// Output hooks for frontends. Every method defaults to a no-op.
pub trait ExchangeObserver: Send {
    fn on_state(&mut self, _state: ExchangeState) {}

    /// A user-visible status line (rate limit notice, retry, error, cancel)
    fn on_message(&mut self, _text: &str) {}

    fn on_user_turn(&mut self, _turn: &Turn) {}

    /// The in-progress model turn, re-sent in full on every text chunk
    fn on_text(&mut self, _text_so_far: &str) {}

    fn on_tool_start(&mut self, _call: &FunctionCall) {}

    fn on_tool_finish(&mut self, _result: &ToolResult) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl ExchangeObserver for NoopObserver {}

/// Shared cancel switch and single-exchange guard
#[derive(Debug, Clone, Default)]
pub struct ExchangeControl {
    running: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl ExchangeControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns false when nothing is running.
    pub fn cancel(&self) -> bool {
        if self.running.load(Ordering::SeqCst) {
            self.cancelled.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Claim the exchange slot
    pub fn begin(&self) -> Result<ExchangeGuard> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(KilnError::ExchangeInProgress);
        }
        self.cancelled.store(false, Ordering::SeqCst);
        Ok(ExchangeGuard {
            control: self.clone(),
        })
    }
}

/// Releases the exchange slot when dropped
#[derive(Debug)]
pub struct ExchangeGuard {
    control: ExchangeControl,
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        self.control.running.store(false, Ordering::SeqCst);
        self.control.cancelled.store(false, Ordering::SeqCst);
    }
}

/// A user submission: text and an optional inline image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInput {
    pub text: String,
    pub image: Option<InlineData>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    /// Attach an image already encoded as base64
    pub fn with_image(mut self, mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        self.image = Some(InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        });
        self
    }

    /// Attach raw image bytes
    pub fn with_image_bytes(self, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.with_image(mime_type, data)
    }

    /// Attach an image file; the MIME type comes from its extension
    pub fn with_image_file(self, path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let mime_type = match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => {
                return Err(KilnError::InvalidInput(format!(
                    "'{}' is not a supported image (png, jpg, gif, webp)",
                    path.display()
                )))
            }
        };
        let bytes = std::fs::read(path)?;
        Ok(self.with_image_bytes(mime_type, &bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image.is_none()
    }

    /// The user turn: trimmed text first, then the image
    pub fn into_turn(self) -> Turn {
        let mut parts = Vec::new();
        let text = self.text.trim();
        if !text.is_empty() {
            parts.push(Part::text(text));
        }
        if let Some(image) = self.image {
            parts.push(Part::InlineData(image));
        }
        Turn::new(Role::User, parts)
    }
}

/// Drives exchanges against one provider, session and tool executor
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    executor: ToolExecutor,
    sessions: SessionManager,
    rotator: CredentialRotator,
    rate: RateLimiter,
    control: ExchangeControl,
    model: String,
    mode: AgentMode,
    state: ExchangeState,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        executor: ToolExecutor,
        rotator: CredentialRotator,
        rate: RateLimiter,
        model: impl Into<String>,
    ) -> Self {
        let sessions = SessionManager::new(executor.tool_definitions());
        Self {
            provider,
            executor,
            sessions,
            rotator,
            rate,
            control: ExchangeControl::new(),
            model: model.into(),
            mode: AgentMode::default(),
            state: ExchangeState::Idle,
        }
    }

    pub fn with_mode(mut self, mode: AgentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Handle for cancelling from another task
    pub fn control(&self) -> ExchangeControl {
        self.control.clone()
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Takes effect on the next submission
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    /// Takes effect on the next submission
    pub fn set_mode(&mut self, mode: AgentMode) {
        self.mode = mode;
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn rotator(&self) -> &CredentialRotator {
        &self.rotator
    }

    pub fn rotator_mut(&mut self) -> &mut CredentialRotator {
        &mut self.rotator
    }

    pub fn rate_limiter_mut(&mut self) -> &mut RateLimiter {
        &mut self.rate
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    fn transition(&mut self, next: ExchangeState, observer: &mut dyn ExchangeObserver) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(target: "kiln.chat.engine", from = ?self.state, to = ?next, "unexpected state transition");
        }
        tracing::debug!(target: "kiln.chat.engine", from = ?self.state, to = ?next, "state");
        self.state = next;
        observer.on_state(next);
    }

    /// Run one exchange to completion. Fails only when another exchange is
    /// already running.
    pub async fn submit(
        &mut self,
        input: UserInput,
        observer: &mut dyn ExchangeObserver,
    ) -> Result<ExchangeOutcome> {
        if input.is_empty() {
            return Ok(ExchangeOutcome::Ignored);
        }
        let _guard = self.control.begin()?;
        let prompt = input.into_turn();
        observer.on_user_turn(&prompt);

        self.transition(ExchangeState::RateLimitWait, observer);
        let remaining = self.rate.remaining();
        if !remaining.is_zero() {
            observer.on_message(&format!(
                "Rate limit active. Waiting for {}s...",
                display_secs(remaining)
            ));
            self.rate.wait().await;
        }
        if self.control.is_cancelled() {
            return Ok(self.finish_cancelled(None, observer));
        }

        if self.sessions.needs_restart(&self.model, self.mode) {
            let history = self.sessions.history();
            let restarted = self
                .sessions
                .restart_with_history(&mut self.rotator, &self.model, self.mode, history)
                .map(|_| ());
            if let Err(e) = restarted {
                observer.on_message(&format!("Error: Could not start chat session. {}", e));
                self.transition(ExchangeState::Idle, observer);
                return Ok(ExchangeOutcome::SessionFailed(e.to_string()));
            }
        }

        self.rotator.reset_tried();
        self.rate.mark();

        tracing::info!(
            target: "kiln.chat.engine",
            model = %self.model,
            mode = %self.mode,
            credential_index = self.rotator.current_index(),
            "exchange start"
        );
        let outcome = self.run_rounds(prompt, observer).await;
        match &outcome {
            ExchangeOutcome::Completed { rounds, .. } => {
                tracing::info!(target: "kiln.chat.engine", rounds, "exchange complete")
            }
            other => tracing::info!(target: "kiln.chat.engine", outcome = ?other, "exchange ended"),
        }
        if self.state != ExchangeState::Idle {
            self.transition(ExchangeState::Idle, observer);
        }
        Ok(outcome)
    }

    async fn run_rounds(
        &mut self,
        first_prompt: Turn,
        observer: &mut dyn ExchangeObserver,
    ) -> ExchangeOutcome {
        let mut prompt = first_prompt;
        let mut rounds = 0;

        loop {
            if self.control.is_cancelled() {
                return self.finish_cancelled(Some(prompt), observer);
            }
            self.transition(ExchangeState::Sending, observer);

            let accumulated = match self.stream_round(&prompt, observer).await {
                Ok(Some(accumulated)) => accumulated,
                Ok(None) => return self.finish_cancelled(Some(prompt), observer),
                Err(e) if !e.is_credential_failure() => {
                    tracing::error!(target: "kiln.chat.engine", error = %e, "exchange aborted");
                    observer.on_message(&format!("Error: {}", e));
                    self.record_pending_results(prompt);
                    return ExchangeOutcome::Failed(e.to_string());
                }
                Err(e) => {
                    self.transition(ExchangeState::CredentialFailure, observer);
                    tracing::warn!(
                        target: "kiln.chat.engine",
                        error = %e,
                        credential_index = self.rotator.current_index(),
                        "model call failed"
                    );
                    self.rotator.advance();
                    if self.rotator.exhausted() {
                        observer.on_message(EXHAUSTED_MESSAGE);
                        tracing::error!(target: "kiln.chat.engine", "all credentials failed");
                        self.record_pending_results(prompt);
                        return ExchangeOutcome::CredentialsExhausted;
                    }

                    let interval = self.rate.interval();
                    observer.on_message(&format!(
                        "API key failed. Waiting for {}s before retrying...",
                        display_secs(interval)
                    ));
                    tokio::time::sleep(interval).await;
                    if self.control.is_cancelled() {
                        return self.finish_cancelled(Some(prompt), observer);
                    }

                    let history = self.sessions.history();
                    let restarted = self
                        .sessions
                        .restart_with_history(&mut self.rotator, &self.model, self.mode, history)
                        .map(|_| ());
                    if let Err(e) = restarted {
                        observer.on_message(&format!("Error: Could not start chat session. {}", e));
                        return ExchangeOutcome::SessionFailed(e.to_string());
                    }
                    self.rate.mark();
                    continue;
                }
            };

            rounds += 1;
            let calls = accumulated.function_calls().to_vec();
            let text = accumulated.text().to_string();
            if let Some(session) = self.sessions.session_mut() {
                session.commit(prompt, accumulated.into_turn());
            }

            if calls.is_empty() {
                self.transition(ExchangeState::Idle, observer);
                return ExchangeOutcome::Completed { text, rounds };
            }

            if self.control.is_cancelled() {
                // Every call still gets a result.
                let skipped = calls
                    .iter()
                    .map(|c| ToolResult::error(&c.name, c.id.clone(), CANCELLED_MESSAGE).to_function_response())
                    .collect();
                return self.finish_cancelled(Some(Turn::tool_responses(skipped)), observer);
            }

            self.transition(ExchangeState::ExecutingTools, observer);
            tracing::info!(target: "kiln.chat.engine", round = rounds, tool_calls = calls.len(), "executing tools");
            for call in &calls {
                observer.on_tool_start(call);
            }
            let results = self.executor.execute_all(&calls).await;
            for result in &results {
                observer.on_tool_finish(result);
            }

            prompt = Turn::tool_responses(results.iter().map(ToolResult::to_function_response).collect());
        }
    }

    /// Stream one round. `Ok(None)` means cancellation was observed.
    async fn stream_round(
        &mut self,
        prompt: &Turn,
        observer: &mut dyn ExchangeObserver,
    ) -> Result<Option<StreamAccumulator>> {
        let request = self
            .sessions
            .session()
            .ok_or_else(|| KilnError::Session("No active chat session.".to_string()))?
            .request(prompt);

        tracing::debug!(
            target: "kiln.chat.engine",
            contents = request.contents.len(),
            credential_index = self.rotator.current_index(),
            "sending round"
        );
        let mut stream = self.provider.stream_generate(request).await?;
        self.transition(ExchangeState::StreamingResponse, observer);

        let mut accumulated = StreamAccumulator::new();
        while let Some(chunk) = stream.next().await {
            if accumulated.process(chunk?) {
                observer.on_text(accumulated.text());
            }
            if self.control.is_cancelled() {
                return Ok(None);
            }
        }
        Ok(Some(accumulated))
    }

    /// Tool results already computed go into history so every call keeps
    /// exactly one response.
    fn record_pending_results(&mut self, prompt: Turn) {
        if prompt.role != Role::Tool {
            return;
        }
        if let Some(session) = self.sessions.session_mut() {
            session.record(prompt);
        }
    }

    fn finish_cancelled(
        &mut self,
        pending: Option<Turn>,
        observer: &mut dyn ExchangeObserver,
    ) -> ExchangeOutcome {
        if let Some(prompt) = pending {
            self.record_pending_results(prompt);
        }
        self.transition(ExchangeState::Cancelled, observer);
        observer.on_message(CANCELLED_MESSAGE);
        tracing::info!(target: "kiln.chat.engine", "exchange cancelled");
        self.transition(ExchangeState::Idle, observer);
        ExchangeOutcome::Cancelled
    }

    /// Ask the model to summarize the conversation, then replace the session
    /// with one seeded by that summary. Returns the summary.
    pub async fn condense_history(
        &mut self,
        observer: &mut dyn ExchangeObserver,
    ) -> Result<Option<String>> {
        let _guard = self.control.begin()?;
        let Some(session) = self.sessions.session() else {
            observer.on_message("No active session to condense.");
            return Ok(None);
        };
        if session.history().is_empty() {
            observer.on_message("History is already empty.");
            return Ok(None);
        }
        observer.on_message("Condensing history... This will start a new session.");

        let prompt = Turn::user(CONDENSE_PROMPT);
        let request = session.request(&prompt);
        self.rate.wait().await;
        self.rate.mark();

        let summary = match self.provider.stream_generate(request).await {
            Ok(stream) => collect_text(stream).await,
            Err(e) => Err(e),
        };
        let summary = match summary {
            Ok(summary) => summary,
            Err(e) => {
                observer.on_message(&format!("An error occurred: {}", e));
                return Err(e);
            }
        };

        let seeded = vec![prompt, Turn::model(summary.clone())];
        self.sessions
            .start(&mut self.rotator, &self.model, self.mode, seeded)?;
        observer.on_message("Original conversation history has been condensed.");
        observer.on_message(&summary);
        tracing::info!(target: "kiln.chat.engine", summary_len = summary.len(), "history condensed");
        Ok(Some(summary))
    }

    /// Replace the session with a fresh empty one
    pub fn clear_history(&mut self, observer: &mut dyn ExchangeObserver) -> Result<()> {
        let _guard = self.control.begin()?;
        let cleared = self
            .sessions
            .clear(&mut self.rotator, &self.model, self.mode)
            .map(|_| ());
        if let Err(e) = cleared {
            observer.on_message(&format!("Error: Could not start chat session. {}", e));
            return Err(e);
        }
        observer.on_message("Conversation history cleared.");
        Ok(())
    }

    pub fn view_history(&self) -> Result<String> {
        self.sessions.view_history()
    }
}

async fn collect_text(mut stream: ChunkStream) -> Result<String> {
    let mut accumulated = StreamAccumulator::new();
    while let Some(chunk) = stream.next().await {
        accumulated.process(chunk?);
    }
    Ok(accumulated.text().to_string())
}

/// Front-end facing client: the orchestrator plus credential and project
/// management backed by the key-value store.
pub struct ChatClient {
    orchestrator: Orchestrator,
    context: ToolContext,
}

impl ChatClient {
    /// Build a client over `context`, loading stored credentials
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        context: ToolContext,
        settings: &Settings,
    ) -> Result<Self> {
        let stored = context.store.get(KEY_API_KEYS)?.unwrap_or_default();
        let rotator = CredentialRotator::from_text(&stored);
        tracing::debug!(target: "kiln.chat.session", credentials = rotator.len(), "credentials loaded");

        let executor = ToolExecutor::new(ToolRegistry::with_builtins(), context.clone());
        let orchestrator = Orchestrator::new(
            provider,
            executor,
            rotator,
            RateLimiter::from_secs(settings.agent.rate_limit_secs),
            settings.model.default_model.clone(),
        )
        .with_mode(settings.agent.mode);

        Ok(Self {
            orchestrator,
            context,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    pub fn control(&self) -> ExchangeControl {
        self.orchestrator.control()
    }

    pub async fn send(
        &mut self,
        input: UserInput,
        observer: &mut dyn ExchangeObserver,
    ) -> Result<ExchangeOutcome> {
        self.orchestrator.submit(input, observer).await
    }

    /// Persist newline-delimited credentials and reload the rotator.
    /// Returns how many were loaded.
    pub fn save_credentials(&mut self, text: &str) -> Result<usize> {
        let rotator = CredentialRotator::from_text(text);
        let count = rotator.len();
        self.context.store.set(KEY_API_KEYS, text)?;
        *self.orchestrator.rotator_mut() = rotator;
        tracing::info!(target: "kiln.chat.session", credentials = count, "credentials saved");
        Ok(count)
    }

    pub fn credential_count(&self) -> usize {
        self.orchestrator.rotator().len()
    }

    /// Bind `path` as the project root and remember it. Returns the root name.
    pub fn open_project(&self, path: &Path) -> Result<String> {
        let tree = FsProjectTree::open(path)?;
        let root = tree
            .root_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let name = tree.root_name();

        self.context.unbind_project();
        self.context.bind_project(Arc::new(tree));
        self.context.store.set(KEY_ROOT_DIRECTORY, &root)?;
        tracing::info!(target: "kiln.chat.session", root = %root, "project opened");
        Ok(name)
    }

    /// Re-open the remembered project root, if it still exists
    pub fn restore_project(&self) -> Result<Option<String>> {
        let Some(root) = self.context.store.get(KEY_ROOT_DIRECTORY)? else {
            return Ok(None);
        };
        let path = Path::new(&root);
        if !path.is_dir() {
            tracing::warn!(target: "kiln.chat.session", root = %root, "remembered project root is gone");
            self.context.store.remove(KEY_ROOT_DIRECTORY)?;
            return Ok(None);
        }
        self.open_project(path).map(Some)
    }

    /// Unbind the project, close every document and forget the root
    pub fn forget_project(&self) -> Result<()> {
        self.context.unbind_project();
        self.context.store.remove(KEY_ROOT_DIRECTORY)?;
        tracing::info!(target: "kiln.chat.session", "project forgotten");
        Ok(())
    }

    pub async fn condense_history(
        &mut self,
        observer: &mut dyn ExchangeObserver,
    ) -> Result<Option<String>> {
        self.orchestrator.condense_history(observer).await
    }

    pub fn clear_history(&mut self, observer: &mut dyn ExchangeObserver) -> Result<()> {
        self.orchestrator.clear_history(observer)
    }

    pub fn view_history(&self) -> Result<String> {
        self.orchestrator.view_history()
    }
}
