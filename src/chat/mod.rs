// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat sessions and the agentic exchange loop

pub mod engine;
pub mod prompts;
pub mod session;
pub mod streaming;

pub use engine::{
    ChatClient, ExchangeControl, ExchangeObserver, ExchangeOutcome, ExchangeState, NoopObserver,
    Orchestrator, UserInput,
};
pub use session::{AgentMode, ChatSession, SessionManager};
pub use streaming::StreamAccumulator;
