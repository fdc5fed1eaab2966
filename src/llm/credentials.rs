// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Round-robin API credential rotation
//!
//! The rotator hands out the current credential, moves to the next one when a
//! model call fails, and tracks which positions have been tried during the
//! current exchange so the caller knows when to give up.

use std::collections::HashSet;
use std::fmt;

use crate::error::{KilnError, Result};

/// Ordered credential set with a cursor and a per-exchange tried set
#[derive(Clone, Default)]
pub struct CredentialRotator {
    credentials: Vec<String>,
    current_index: usize,
    tried: HashSet<usize>,
}

impl fmt::Debug for CredentialRotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRotator")
            .field("count", &self.credentials.len())
            .field("current_index", &self.current_index)
            .field("tried", &self.tried.len())
            .finish()
    }
}

impl CredentialRotator {
    pub fn new(credentials: Vec<String>) -> Self {
        Self {
            credentials,
            current_index: 0,
            tried: HashSet::new(),
        }
    }

    /// Build from newline-delimited text, dropping blank lines
    pub fn from_text(text: &str) -> Self {
        Self::new(parse_credentials(text))
    }

    /// Replace the credential set; resets the cursor and tried set
    pub fn load(&mut self, text: &str) {
        *self = Self::from_text(text);
    }

    /// The credential at the cursor. Marks its position as tried.
    pub fn current(&mut self) -> Result<String> {
        let credential = self
            .credentials
            .get(self.current_index)
            .cloned()
            .ok_or(KilnError::NoCredentials)?;
        self.tried.insert(self.current_index);
        Ok(credential)
    }

    /// Move the cursor to the next credential, wrapping around
    pub fn advance(&mut self) {
        if !self.credentials.is_empty() {
            self.current_index = (self.current_index + 1) % self.credentials.len();
        }
    }

    /// True once every position has been handed out since the last reset
    pub fn exhausted(&self) -> bool {
        self.tried.len() >= self.credentials.len()
    }

    pub fn reset_tried(&mut self) {
        self.tried.clear();
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn tried_count(&self) -> usize {
        self.tried.len()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

/// Split newline-delimited credentials, trimming and dropping blank entries
pub fn parse_credentials(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
