// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use crate::error::{KilnError, Result};

use super::migration;
use super::Settings;

impl Settings {
    /// `<kiln home>/settings.json`
    pub fn default_path() -> PathBuf {
        Self::kiln_home().join("settings.json")
    }

    /// Load settings from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load settings from a specific path. A missing file gives defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let invalid = |e: serde_json::Error| {
            KilnError::Config(format!("{} is not valid settings JSON: {}", path.display(), e))
        };
        let content = std::fs::read_to_string(path)?;
        let raw_value: serde_json::Value = serde_json::from_str(&content).map_err(invalid)?;
        serde_json::from_value(migration::migrate_on_load(raw_value)).map_err(invalid)
    }

    /// Save settings to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Write to `path`, keeping keys this version does not know about. An
    /// unreadable existing file is replaced. The write goes through a
    /// sibling temp file so a crash never leaves half a settings file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let ours = serde_json::to_value(self)?;
        let merged = match std::fs::read_to_string(path) {
            Ok(existing) => match serde_json::from_str::<serde_json::Value>(&existing) {
                Ok(theirs) => migration::deep_merge(theirs, ours),
                Err(e) => {
                    tracing::warn!(
                        target: "kiln.config",
                        path = %path.display(),
                        error = %e,
                        "replacing unreadable settings file"
                    );
                    ours
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ours,
            Err(e) => return Err(e.into()),
        };

        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, serde_json::to_string_pretty(&merged)?)?;
        std::fs::rename(&staging, path)?;
        Ok(())
    }

    /// `$KILN_HOME` when set and non-empty, else `~/.kiln`.
    pub fn kiln_home() -> PathBuf {
        match std::env::var_os("KILN_HOME") {
            Some(home) if !home.is_empty() => PathBuf::from(home),
            _ => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".kiln"),
        }
    }

    /// Directory backing the key-value store.
    pub fn storage_dir(&self) -> PathBuf {
        self.storage
            .dir
            .clone()
            .unwrap_or_else(|| Self::kiln_home().join("store"))
    }

    /// `$KILN_GEMINI_BASE_URL` overrides `model.base_url`.
    pub fn gemini_base_url(&self) -> Option<String> {
        std::env::var("KILN_GEMINI_BASE_URL")
            .ok()
            .or_else(|| self.model.base_url.clone())
    }
}
