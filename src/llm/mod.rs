// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for Kiln
//!
//! Provider abstraction, conversation turns, credential rotation and rate
//! limiting.

pub mod credentials;
pub mod message;
pub mod mock_provider;
pub mod provider;
pub mod providers;
pub mod rate_limit;

pub use credentials::CredentialRotator;
pub use message::*;
pub use provider::*;
pub use rate_limit::RateLimiter;
