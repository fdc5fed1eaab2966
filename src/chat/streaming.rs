// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming response handling
//!
//! Folds streamed chunks into one model turn, keeping the stream processing
//! separate from the I/O that drives it.

use crate::llm::message::{FunctionCall, Part, Role, Turn};
use crate::llm::provider::{FinishReason, StreamChunk};

/// Accumulator for one streamed model turn
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    function_calls: Vec<FunctionCall>,
    finish_reason: Option<FinishReason>,
    chunks: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a chunk. Returns true when it carried new text.
    pub fn process(&mut self, chunk: StreamChunk) -> bool {
        self.chunks += 1;
        let has_text = !chunk.text.is_empty();
        self.text.push_str(&chunk.text);
        self.function_calls.extend(chunk.function_calls);
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason;
        }
        has_text
    }

    /// Text received so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn function_calls(&self) -> &[FunctionCall] {
        &self.function_calls
    }

    pub fn has_function_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }

    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.finish_reason.as_ref()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// The completed model turn: text first, then calls in arrival order
    pub fn into_turn(self) -> Turn {
        let mut parts = Vec::with_capacity(self.function_calls.len() + 1);
        if !self.text.is_empty() || self.function_calls.is_empty() {
            parts.push(Part::Text(self.text));
        }
        parts.extend(self.function_calls.into_iter().map(Part::FunctionCall));
        Turn::new(Role::Model, parts)
    }
}
