// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM Provider trait and related types
//!
//! A provider turns one [`GenerateRequest`] into a stream of
//! [`StreamChunk`]s. The request carries the whole history, so a provider
//! holds no conversation state and a session rebuild is just a new request.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::llm::message::{FunctionCall, Turn};

/// Stream of chunks produced by a provider
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Main trait for model backends
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &str;

    /// Start a streamed generation. Errors returned here, or yielded by the
    /// stream, are model-call failures.
    async fn stream_generate(&self, request: GenerateRequest) -> Result<ChunkStream>;
}

/// One streamed generation request
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Credential used for this call
    pub credential: String,

    /// Model identifier
    pub model: String,

    /// System instruction
    pub system: Option<String>,

    /// Function declarations offered to the model
    pub tools: Vec<ToolDefinition>,

    /// Enable the provider's grounded web search
    pub web_search: bool,

    /// Full conversation, oldest first, ending with the prompt turn
    pub contents: Vec<Turn>,
}

impl GenerateRequest {
    pub fn new(credential: impl Into<String>, model: impl Into<String>, contents: Vec<Turn>) -> Self {
        Self {
            credential: credential.into(),
            model: model.into(),
            system: None,
            tools: vec![],
            web_search: false,
            contents,
        }
    }

    /// Set the system instruction
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set tools
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }
}

/// An incremental piece of a model turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    /// Text delta
    pub text: String,

    /// Function calls completed in this chunk
    pub function_calls: Vec<FunctionCall>,

    /// Set on the final chunk
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn call(call: FunctionCall) -> Self {
        Self {
            function_calls: vec![call],
            ..Default::default()
        }
    }

    pub fn finished(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Default::default()
        }
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of turn
    Stop,
    /// Hit the output token limit
    MaxTokens,
    /// Stopped by a safety filter
    Safety,
    /// Anything else the provider reports
    Other(String),
}

impl FinishReason {
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::MaxTokens,
            "SAFETY" => FinishReason::Safety,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// Tool definition for the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input schema (JSON Schema)
    pub input_schema: ToolInputSchema,
}

/// Input schema for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Schema type (always "object")
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Property definitions
    pub properties: serde_json::Value,

    /// Required properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}
