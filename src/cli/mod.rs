// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI module for Kiln
//!
//! Command-line arguments and the slash commands understood by the REPL.

pub mod args;
pub mod commands;

pub use args::*;
pub use commands::{parse_command, ChatCommand};
