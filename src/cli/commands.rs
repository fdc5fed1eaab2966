// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Slash commands for the interactive chat
//!
//! Pure parsing, so the REPL only has to act on the result.

use std::path::PathBuf;

use crate::chat::session::AgentMode;

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Leave the chat
    Exit,
    Help,
    /// Start over with an empty history
    Clear,
    /// Summarize the history into a fresh session
    Condense,
    /// Print the history as JSON
    History,
    /// Show the active model
    Model,
    ModelSwitch(String),
    /// Show the active mode
    Mode,
    ModeSwitch(AgentMode),
    /// Replace the stored API keys (`;` separates keys on one line)
    Keys(String),
    /// Open a project folder
    Open(PathBuf),
    /// Close the project folder
    Forget,
    /// Attach an image to the next message
    Image(PathBuf),
    /// Regular user message
    Message(String),
    Empty,
    /// Unknown command or missing argument, with a hint
    Invalid(String),
}

/// Parse user input into a [`ChatCommand`]
pub fn parse_command(input: &str) -> ChatCommand {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return ChatCommand::Empty;
    }
    if !trimmed.starts_with('/') {
        return match trimmed.to_lowercase().as_str() {
            "exit" | "quit" => ChatCommand::Exit,
            _ => ChatCommand::Message(trimmed.to_string()),
        };
    }

    let (name, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (trimmed, ""),
    };

    match name.to_lowercase().as_str() {
        "/exit" | "/quit" => ChatCommand::Exit,
        "/help" => ChatCommand::Help,
        "/clear" => ChatCommand::Clear,
        "/condense" => ChatCommand::Condense,
        "/history" => ChatCommand::History,
        "/model" if arg.is_empty() => ChatCommand::Model,
        "/model" => ChatCommand::ModelSwitch(arg.to_string()),
        "/mode" if arg.is_empty() => ChatCommand::Mode,
        "/mode" => match arg.parse::<AgentMode>() {
            Ok(mode) => ChatCommand::ModeSwitch(mode),
            Err(e) => ChatCommand::Invalid(e.to_string()),
        },
        "/keys" if arg.is_empty() => ChatCommand::Invalid("Usage: /keys <key>[;<key>...]".to_string()),
        "/keys" => ChatCommand::Keys(
            arg.split(';')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        "/open" if arg.is_empty() => ChatCommand::Invalid("Usage: /open <folder>".to_string()),
        "/open" => ChatCommand::Open(PathBuf::from(arg)),
        "/forget" => ChatCommand::Forget,
        "/image" if arg.is_empty() => ChatCommand::Invalid("Usage: /image <file>".to_string()),
        "/image" => ChatCommand::Image(PathBuf::from(arg)),
        _ => ChatCommand::Invalid(format!("Unknown command: {}. Type /help for commands.", name)),
    }
}

/// Help text for the REPL
pub fn format_help_text() -> String {
    [
        "",
        "Commands:",
        "  /open <folder>   - Open a project folder",
        "  /forget          - Close the project folder",
        "  /keys <k1;k2>    - Replace the stored API keys",
        "  /model [name]    - Show or switch the model",
        "  /mode [mode]     - Show or switch mode (code, plan, search)",
        "  /image <file>    - Attach an image to the next message",
        "  /condense        - Summarize the conversation into a new session",
        "  /clear           - Clear the conversation history",
        "  /history         - Print the conversation history as JSON",
        "  /help            - Show this help message",
        "  exit             - Exit kiln",
        "",
        "Tip: Press Ctrl+C to cancel a running exchange without exiting.",
        "",
    ]
    .join("\n")
}
