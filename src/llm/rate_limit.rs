// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Minimum-interval rate limiting between exchange submissions

use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum interval between model submissions
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: None,
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// How long a submission made now would have to wait
    pub fn remaining(&self) -> Duration {
        match self.last_request {
            Some(last) => self.interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Sleep out the remainder of the interval, if any. Returns the wait.
    pub async fn wait(&self) -> Duration {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            tracing::debug!(
                target: "kiln.chat.engine",
                wait_ms = remaining.as_millis() as u64,
                "rate limit active"
            );
            tokio::time::sleep(remaining).await;
        }
        remaining
    }

    /// Record that a submission happened now
    pub fn mark(&mut self) {
        self.last_request = Some(Instant::now());
    }

    pub fn last_request(&self) -> Option<Instant> {
        self.last_request
    }
}

/// Whole seconds to show the user for a wait, rounded up
pub fn display_secs(wait: Duration) -> u64 {
    let millis = wait.as_millis() as u64;
    millis.div_ceil(1000)
}
