// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use super::{RunnerKind, Settings};

/// Longest rate-limit interval accepted without a warning
const MAX_RATE_LIMIT_SECS: u64 = 300;

impl Settings {
    /// Problems worth telling the user about. Never fatal.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.model.default_model.trim().is_empty() {
            warnings.push("No default model is set; sessions cannot start.".to_string());
        }

        if self.agent.rate_limit_secs > MAX_RATE_LIMIT_SECS {
            warnings.push(format!(
                "Rate limit of {}s is unusually long (over {}s).",
                self.agent.rate_limit_secs, MAX_RATE_LIMIT_SECS
            ));
        }

        if self.tools.runner == RunnerKind::Http
            && self
                .tools
                .endpoint
                .as_deref()
                .map_or(true, |e| e.trim().is_empty())
        {
            warnings.push(
                "The http command runner needs tools.endpoint; terminal commands will fail."
                    .to_string(),
            );
        }

        warnings
    }
}
