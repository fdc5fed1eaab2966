// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::path::PathBuf;

use crossterm::style::Color;

use kiln::chat::engine::{ChatClient, ExchangeControl, UserInput};
use kiln::cli::commands::format_help_text;
use kiln::cli::{parse_command, ChatCommand};
use kiln::error::Result;

use super::terminal::{print_colored, TerminalObserver};

/// Interactive chat loop
pub(super) async fn run(client: &mut ChatClient) -> Result<()> {
    print_welcome(client);
    spawn_interrupt_handler(client.control());

    let mut observer = TerminalObserver::new();
    let mut pending_image: Option<PathBuf> = None;

    while let Some(line) = read_user_input()? {
        match parse_command(&line) {
            ChatCommand::Exit => break,
            ChatCommand::Empty => {}
            ChatCommand::Help => println!("{}", format_help_text()),
            // Failures are already reported through the observer.
            ChatCommand::Clear => {
                let _ = client.clear_history(&mut observer);
            }
            ChatCommand::Condense => {
                let _ = client.condense_history(&mut observer).await;
            }
            ChatCommand::History => match client.view_history() {
                Ok(json) => println!("{}", json),
                Err(e) => print_error(&e.to_string()),
            },
            ChatCommand::Model => println!("Model: {}", client.orchestrator().model()),
            ChatCommand::ModelSwitch(model) => {
                println!("Model set to {}. Takes effect on the next message.", model);
                client.orchestrator_mut().set_model(model);
            }
            ChatCommand::Mode => println!("Mode: {}", client.orchestrator().mode()),
            ChatCommand::ModeSwitch(mode) => {
                println!("Mode set to {}. Takes effect on the next message.", mode);
                client.orchestrator_mut().set_mode(mode);
            }
            ChatCommand::Keys(text) => match client.save_credentials(&text) {
                Ok(count) => println!("Saved {} API key(s).", count),
                Err(e) => print_error(&e.to_string()),
            },
            ChatCommand::Open(path) => match client.open_project(&path) {
                Ok(name) => println!("Opened project '{}'.", name),
                Err(e) => print_error(&e.to_string()),
            },
            ChatCommand::Forget => match client.forget_project() {
                Ok(()) => println!("Project closed."),
                Err(e) => print_error(&e.to_string()),
            },
            ChatCommand::Image(path) => {
                println!("Image '{}' will be attached to your next message.", path.display());
                pending_image = Some(path);
            }
            ChatCommand::Invalid(hint) => print_error(&hint),
            ChatCommand::Message(text) => {
                let mut input = UserInput::text(text);
                if let Some(path) = pending_image.take() {
                    input = match input.with_image_file(&path) {
                        Ok(input) => input,
                        Err(e) => {
                            print_error(&e.to_string());
                            continue;
                        }
                    };
                }
                report(client.send(input, &mut observer).await);
            }
        }
    }

    Ok(())
}

/// Ctrl+C cancels a running exchange; when idle it exits.
fn spawn_interrupt_handler(control: ExchangeControl) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if !control.cancel() {
                println!();
                std::process::exit(130);
            }
        }
    });
}

fn print_welcome(client: &ChatClient) {
    print_colored(Color::Cyan, &format!("kiln v{}\n", env!("CARGO_PKG_VERSION")));
    println!("AI coding assistant for your terminal");
    println!("Model: {}", client.orchestrator().model());
    println!("Mode: {}", client.orchestrator().mode());
    match client.context().project_name() {
        Some(name) => println!("Project: {}", name),
        None => println!("Project: (none, use /open <folder>)"),
    }
    if client.credential_count() == 0 {
        print_colored(Color::Yellow, "No API keys configured. Use /keys to add some.\n");
    }
    println!("Type /help for commands.\n");
}

/// Read one line. `None` at end of input.
fn read_user_input() -> Result<Option<String>> {
    print_colored(Color::Green, "you: ");
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input)?;
    io::stdout().flush()?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

fn report<T>(result: Result<T>) {
    if let Err(e) = result {
        print_error(&e.to_string());
    }
}

fn print_error(text: &str) {
    print_colored(Color::Red, &format!("{}\n", text));
}
