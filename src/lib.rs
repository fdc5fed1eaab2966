// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Kiln - AI coding assistant core.
//!
//! This crate exposes the runtime behind the `kiln` CLI (`src/main.rs`).
//!
//! Architecture highlights:
//! - `chat`: the exchange orchestrator, sessions and streaming accumulation
//! - `llm`: turns, the provider abstraction, Gemini, credential rotation and rate limiting
//! - `tools`: the tool context, registry, executor and built-in tools
//! - `indexer`: the symbol index and JavaScript structure analysis
//! - `store`: persistent key-value storage
//! - `config`, `cli`: settings and command-line surface

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod indexer;
pub mod llm;
pub mod store;
pub mod tools;

pub use error::{KilnError, Result};
