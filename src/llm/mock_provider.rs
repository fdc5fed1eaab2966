// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock LLM provider for testing
//!
//! Serves a script of canned rounds in order, records every request, and can
//! fail a call outright or part-way through its stream.

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{ApiError, KilnError, Result};
use crate::llm::message::FunctionCall;
use crate::llm::provider::{ChunkStream, FinishReason, GenerateRequest, LlmProvider, StreamChunk};

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    responses: Arc<Mutex<Vec<MockResponse>>>,
    call_count: Arc<AtomicUsize>,
    recorded_requests: Arc<Mutex<Vec<GenerateRequest>>>,
    chunk_delay: Option<Duration>,
}

/// One scripted model round
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Stream the text in the given pieces, then the calls
    Reply {
        chunks: Vec<String>,
        calls: Vec<FunctionCall>,
    },
    /// Reject the call before any chunk is produced
    Fail(String),
    /// Yield some text chunks, then error
    FailMidStream { chunks: Vec<String>, message: String },
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        MockResponse::Reply {
            chunks: vec![text.into()],
            calls: vec![],
        }
    }

    pub fn calls(calls: Vec<(&str, serde_json::Value)>) -> Self {
        MockResponse::Reply {
            chunks: vec![],
            calls: calls
                .into_iter()
                .enumerate()
                .map(|(i, (name, args))| FunctionCall {
                    name: name.to_string(),
                    args,
                    id: Some(format!("call-{}", i)),
                })
                .collect(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        MockResponse::Fail(message.into())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a mock that always answers "Mock response"
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(Mutex::new(vec![MockResponse::text("Mock response")])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
            chunk_delay: None,
        }
    }

    /// Queue rounds (served in order; the last one repeats)
    pub fn with_script(self, script: Vec<MockResponse>) -> Self {
        {
            let mut responses = lock(&self.responses);
            *responses = script;
        }
        self
    }

    /// Sleep before every chunk, so tests can cancel mid-stream
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Number of stream_generate calls so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn recorded_requests(&self) -> Vec<GenerateRequest> {
        lock(&self.recorded_requests).clone()
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        lock(&self.recorded_requests).last().cloned()
    }

    fn next_response(&self) -> MockResponse {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = lock(&self.responses);
        if responses.is_empty() {
            MockResponse::text("Mock response")
        } else {
            responses[count.min(responses.len() - 1)].clone()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_generate(&self, request: GenerateRequest) -> Result<ChunkStream> {
        lock(&self.recorded_requests).push(request);

        let items: Vec<Result<StreamChunk>> = match self.next_response() {
            MockResponse::Fail(message) => {
                return Err(ApiError::ServerError {
                    status: 400,
                    message,
                }
                .into());
            }
            MockResponse::Reply { chunks, calls } => {
                let mut items: Vec<Result<StreamChunk>> =
                    chunks.into_iter().map(|c| Ok(StreamChunk::text(c))).collect();
                items.extend(calls.into_iter().map(|c| Ok(StreamChunk::call(c))));
                items.push(Ok(StreamChunk::finished(FinishReason::Stop)));
                items
            }
            MockResponse::FailMidStream { chunks, message } => {
                let mut items: Vec<Result<StreamChunk>> =
                    chunks.into_iter().map(|c| Ok(StreamChunk::text(c))).collect();
                items.push(Err(KilnError::Api(ApiError::StreamError(message))));
                items
            }
        };

        let delay = self.chunk_delay;
        let stream = stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(Box::pin(stream))
    }
}
