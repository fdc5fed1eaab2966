// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation sessions
//!
//! A session is the value `(model, mode, history)` plus the credential and
//! system instruction it was built with. Sessions are never reconfigured in
//! place: a model or mode change, a failed credential, or a history reset
//! discards the session and builds a new one from an explicit history
//! snapshot.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{KilnError, Result};
use crate::llm::credentials::CredentialRotator;
use crate::llm::message::Turn;
use crate::llm::provider::{GenerateRequest, ToolDefinition};

use super::prompts::system_instruction;

/// Agent persona; selects the system instruction and web search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    #[default]
    Code,
    Plan,
    Search,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Code => "code",
            AgentMode::Plan => "plan",
            AgentMode::Search => "search",
        }
    }

    pub fn web_search(&self) -> bool {
        matches!(self, AgentMode::Search)
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentMode {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "code" => Ok(AgentMode::Code),
            "plan" => Ok(AgentMode::Plan),
            "search" => Ok(AgentMode::Search),
            other => Err(KilnError::InvalidInput(format!(
                "Unknown agent mode '{}'. Expected code, plan or search.",
                other
            ))),
        }
    }
}

/// One live conversation
#[derive(Clone)]
pub struct ChatSession {
    id: Uuid,
    model: String,
    mode: AgentMode,
    credential: String,
    system: String,
    tools: Vec<ToolDefinition>,
    history: Vec<Turn>,
    started_at: DateTime<Utc>,
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("mode", &self.mode)
            .field("turns", &self.history.len())
            .finish()
    }
}

impl ChatSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Request for one round: the full history followed by `prompt`
    pub fn request(&self, prompt: &Turn) -> GenerateRequest {
        let mut contents = self.history.clone();
        contents.push(prompt.clone());
        GenerateRequest::new(self.credential.clone(), self.model.clone(), contents)
            .with_system(self.system.clone())
            .with_tools(self.tools.clone())
            .with_web_search(self.mode.web_search())
    }

    /// Append a completed round
    pub fn commit(&mut self, prompt: Turn, reply: Turn) {
        self.history.push(prompt);
        self.history.push(reply);
    }

    /// Append a single turn outside a round (computed tool results)
    pub fn record(&mut self, turn: Turn) {
        self.history.push(turn);
    }
}

/// Owns the active session and rebuilds it on demand
pub struct SessionManager {
    tools: Vec<ToolDefinition>,
    session: Option<ChatSession>,
}

impl SessionManager {
    pub fn new(tools: Vec<ToolDefinition>) -> Self {
        Self {
            tools,
            session: None,
        }
    }

    /// Build a session carrying `history` verbatim. The current credential
    /// is bound (and marked tried). On failure the previous session, if
    /// any, is kept.
    pub fn start(
        &mut self,
        rotator: &mut CredentialRotator,
        model: &str,
        mode: AgentMode,
        history: Vec<Turn>,
    ) -> Result<&ChatSession> {
        let credential = rotator.current()?;
        if model.trim().is_empty() {
            return Err(KilnError::Session("No model selected.".to_string()));
        }

        tracing::info!(
            target: "kiln.chat.session",
            model = %model,
            mode = %mode,
            history_turns = history.len(),
            credential_index = rotator.current_index(),
            "chat session started"
        );

        let session = ChatSession {
            id: Uuid::new_v4(),
            model: model.to_string(),
            mode,
            credential,
            system: system_instruction(mode, Local::now()),
            tools: self.tools.clone(),
            history,
            started_at: Utc::now(),
        };
        Ok(self.session.insert(session))
    }

    /// Replace the session, preserving `history` exactly
    pub fn restart_with_history(
        &mut self,
        rotator: &mut CredentialRotator,
        model: &str,
        mode: AgentMode,
        history: Vec<Turn>,
    ) -> Result<&ChatSession> {
        self.start(rotator, model, mode, history)
    }

    /// Start a fresh empty session
    pub fn clear(
        &mut self,
        rotator: &mut CredentialRotator,
        model: &str,
        mode: AgentMode,
    ) -> Result<&ChatSession> {
        self.start(rotator, model, mode, Vec::new())
    }

    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut ChatSession> {
        self.session.as_mut()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Snapshot of the history; empty when no session exists
    pub fn history(&self) -> Vec<Turn> {
        self.session
            .as_ref()
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    pub fn active_model_name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.model.as_str())
    }

    pub fn active_mode(&self) -> Option<AgentMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    /// Whether a send with this configuration needs a new session
    pub fn needs_restart(&self, model: &str, mode: AgentMode) -> bool {
        match &self.session {
            Some(session) => session.model != model || session.mode != mode,
            None => true,
        }
    }

    /// History as pretty-printed JSON; `[]` without a session
    pub fn view_history(&self) -> Result<String> {
        match &self.session {
            Some(session) => Ok(serde_json::to_string_pretty(&session.history)?),
            None => Ok("[]".to_string()),
        }
    }
}
