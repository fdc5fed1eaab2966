// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Kiln
//!
//! Tool failures never cross the tool executor boundary as errors; they are
//! folded into result payloads there. Everything else propagates through
//! [`KilnError`].

use thiserror::Error;

/// Main error type for Kiln operations
#[derive(Error, Debug)]
pub enum KilnError {
    /// Model API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// No credentials are configured
    #[error("No API keys configured. Add keys in the settings.")]
    NoCredentials,

    /// A tool precondition was not met (no project open, no selection, ...)
    #[error("{0}")]
    ToolPrecondition(String),

    /// A tool effect failed against the project tree, editor or runner
    #[error("{0}")]
    ToolEffect(String),

    /// A unified diff could not be applied
    #[error("Failed to apply patch. The diff may be invalid or not apply to the file.")]
    Patch,

    /// Session construction errors
    #[error("Session error: {0}")]
    Session(String),

    /// An exchange is already running
    #[error("An exchange is already in progress")]
    ExchangeInProgress,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key-value store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Static analysis errors
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl KilnError {
    /// Whether this error came from a model call and should trigger a
    /// credential rotation.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, KilnError::Api(_) | KilnError::Http(_))
    }
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the API
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Requested model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),

    /// Prompt or response blocked by safety settings
    #[error("Response blocked: {0}")]
    Blocked(String),
}

/// Result type alias for Kiln operations
pub type Result<T> = std::result::Result<T, KilnError>;
