// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use kiln::chat::engine::{ExchangeObserver, ExchangeState};
use kiln::llm::message::{FunctionCall, Part, Turn};
use kiln::tools::ToolResult;

const ARGS_PREVIEW_LEN: usize = 60;

/// Prints an exchange to the terminal as it happens
pub(super) struct TerminalObserver {
    /// Bytes of the current model turn already printed
    printed: usize,
}

impl TerminalObserver {
    pub(super) fn new() -> Self {
        Self { printed: 0 }
    }

    fn finish_line(&mut self) {
        if self.printed > 0 {
            println!();
            self.printed = 0;
        }
    }
}

/// Print `text` in `color`. Terminal write errors are not worth aborting for.
pub(super) fn print_colored(color: Color, text: &str) {
    let mut stdout = io::stdout();
    let _ = stdout.execute(SetForegroundColor(color));
    print!("{}", text);
    let _ = stdout.execute(ResetColor);
    let _ = stdout.flush();
}

pub(super) fn truncate_display(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

impl ExchangeObserver for TerminalObserver {
    fn on_state(&mut self, state: ExchangeState) {
        match state {
            ExchangeState::StreamingResponse => {
                self.printed = 0;
                print_colored(Color::Cyan, "\nkiln: ");
            }
            ExchangeState::Idle | ExchangeState::ExecutingTools => self.finish_line(),
            _ => {}
        }
    }

    fn on_message(&mut self, text: &str) {
        self.finish_line();
        print_colored(Color::Yellow, &format!("{}\n", text));
    }

    fn on_user_turn(&mut self, turn: &Turn) {
        let images = turn
            .parts
            .iter()
            .filter(|p| matches!(p, Part::InlineData(_)))
            .count();
        if images > 0 {
            print_colored(Color::DarkGrey, &format!("  (attached {} image(s))\n", images));
        }
    }

    fn on_text(&mut self, text_so_far: &str) {
        if let Some(delta) = text_so_far.get(self.printed..) {
            print!("{}", delta);
            let _ = io::stdout().flush();
        }
        self.printed = text_so_far.len();
    }

    fn on_tool_start(&mut self, call: &FunctionCall) {
        self.finish_line();
        print_colored(Color::DarkGrey, "  ╭─ ");
        print_colored(Color::Magenta, &call.name);
        print_colored(
            Color::DarkGrey,
            &format!(" {}\n", truncate_display(&call.args.to_string(), ARGS_PREVIEW_LEN)),
        );
    }

    fn on_tool_finish(&mut self, result: &ToolResult) {
        if result.is_error() {
            print_colored(Color::Red, &format!("  ╰─ ✗ {}\n", result.name));
        } else {
            print_colored(Color::Green, &format!("  ╰─ ✓ {}\n", result.name));
        }
    }
}
