// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::chat::session::AgentMode;
use crate::config::{RunnerKind, Settings};

/// Kiln - AI coding assistant for your terminal
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(version, about = "AI coding assistant for your terminal")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project folder to open (defaults to the remembered one)
    #[arg(short = 'C', long, global = true)]
    pub project: Option<PathBuf>,

    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Model to use for this run
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Agent mode (code, plan, search)
    #[arg(long, global = true)]
    pub mode: Option<AgentMode>,

    /// Minimum seconds between submissions
    #[arg(long, global = true)]
    pub rate_limit: Option<u64>,

    /// Send terminal commands to this endpoint instead of running them locally
    #[arg(long, global = true)]
    pub runner_endpoint: Option<String>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start interactive chat (default when no command given)
    Chat,

    /// Ask a single question (non-interactive)
    Ask(AskArgs),

    /// Save API keys, one per line
    Keys(KeysArgs),

    /// Show or check the settings
    Settings(SettingsArgs),
}

#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The prompt to send
    pub prompt: String,

    /// Attach an image (png, jpg, gif, webp)
    #[arg(long)]
    pub image: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct KeysArgs {
    /// Read keys from this file instead of stdin
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: Option<SettingsCommands>,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Print the effective settings as JSON
    Show,
    /// Print the settings file location
    Path,
    /// Report configuration problems
    Validate,
}

impl Cli {
    /// Apply per-run overrides on top of the loaded settings
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(model) = &self.model {
            settings.model.default_model = model.clone();
        }
        if let Some(mode) = self.mode {
            settings.agent.mode = mode;
        }
        if let Some(secs) = self.rate_limit {
            settings.agent.rate_limit_secs = secs;
        }
        if let Some(endpoint) = &self.runner_endpoint {
            settings.tools.runner = RunnerKind::Http;
            settings.tools.endpoint = Some(endpoint.clone());
        }
    }

    /// Settings file for this run
    pub fn settings_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Settings::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["kiln"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
        assert!(cli.mode.is_none());
    }

    #[test]
    fn test_parse_ask_with_overrides() {
        let cli = Cli::try_parse_from([
            "kiln", "-vv", "--mode", "search", "-m", "gemini-2.5-pro", "ask", "what is new?",
            "--image", "shot.png",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.mode, Some(AgentMode::Search));
        match cli.command {
            Some(Commands::Ask(ref args)) => {
                assert_eq!(args.prompt, "what is new?");
                assert_eq!(args.image, Some(PathBuf::from("shot.png")));
            }
            ref other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(Cli::try_parse_from(["kiln", "--mode", "debug"]).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::try_parse_from([
            "kiln",
            "--model",
            "gemini-2.5-pro",
            "--rate-limit",
            "2",
            "--runner-endpoint",
            "http://localhost:3000/api/terminal",
        ])
        .unwrap();
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.model.default_model, "gemini-2.5-pro");
        assert_eq!(settings.agent.rate_limit_secs, 2);
        assert_eq!(settings.tools.runner, RunnerKind::Http);
        assert!(settings.validate().is_empty());
    }

    #[test]
    fn test_settings_subcommand() {
        let cli = Cli::try_parse_from(["kiln", "settings", "validate"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Settings(SettingsArgs {
                command: Some(SettingsCommands::Validate)
            }))
        ));
    }
}
