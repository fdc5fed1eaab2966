// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Kiln
//!
//! Handles loading and saving settings from ~/.kiln/settings.json

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::chat::session::AgentMode;

mod io;
mod migration;
mod validation;

/// Main settings structure, stored in ~/.kiln/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Model selection and endpoint
    #[serde(default)]
    pub model: ModelConfig,

    /// Agent persona and pacing
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool backends
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Persistent key-value storage
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Model used for new sessions
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Base URL for the Gemini API (for proxies and tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub mode: AgentMode,

    /// Minimum seconds between submissions
    #[serde(default = "default_rate_limit_secs")]
    pub rate_limit_secs: u64,
}

/// Which backend runs terminal commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    /// `sh -c` on this machine
    #[default]
    Local,
    /// POST to a command service
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ToolsConfig {
    #[serde(default)]
    pub runner: RunnerKind,

    /// Endpoint for the http runner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Prettier executable used by format_code (default: `prettier` on PATH)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prettier: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageConfig {
    /// Key-value store directory (default: ~/.kiln/store)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_rate_limit_secs() -> u64 {
    5
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            base_url: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mode: AgentMode::default(),
            rate_limit_secs: default_rate_limit_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.model.default_model, "gemini-2.5-flash");
        assert_eq!(settings.agent.rate_limit_secs, 5);
        assert_eq!(settings.agent.mode, AgentMode::Code);
        assert_eq!(settings.tools.runner, RunnerKind::Local);
        assert!(settings.storage.dir.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"agent": {"mode": "search"}}"#).unwrap();
        assert_eq!(settings.agent.mode, AgentMode::Search);
        assert_eq!(settings.agent.rate_limit_secs, 5);
        assert_eq!(settings.model.default_model, "gemini-2.5-flash");
        assert!(settings.tools.prettier.is_none());

        let settings: Settings =
            serde_json::from_str(r#"{"tools": {"prettier": "/opt/bin/prettier"}}"#).unwrap();
        assert_eq!(settings.tools.prettier, Some(PathBuf::from("/opt/bin/prettier")));
        assert_eq!(settings.tools.runner, RunnerKind::Local);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&temp_dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.model.default_model = "gemini-2.5-pro".to_string();
        settings.tools.runner = RunnerKind::Http;
        settings.tools.endpoint = Some("http://localhost:3000/api/terminal".to_string());
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"experimental": {"flag": true}, "agent": {"mode": "plan", "note": "keep"}}"#,
        )
        .unwrap();

        let mut settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.agent.mode, AgentMode::Plan);
        settings.agent.rate_limit_secs = 10;
        settings.save_to(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["experimental"]["flag"], true);
        assert_eq!(raw["agent"]["note"], "keep");
        assert_eq!(raw["agent"]["rate_limit_secs"], 10);
    }

    #[test]
    fn test_corrupt_file_is_overwritten_on_save() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, crate::error::KilnError::Config(_)));
        assert!(err.to_string().contains("is not valid settings JSON"));

        std::fs::write(&path, r#"{"agent": {"mode": "debug"}}"#).unwrap();
        assert!(matches!(
            Settings::load_from(&path).unwrap_err(),
            crate::error::KilnError::Config(_)
        ));

        Settings::default().save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
