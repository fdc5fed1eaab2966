// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Kiln - AI coding assistant for your terminal
//!
//! Entry point for the Kiln CLI application.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use kiln::chat::engine::{ChatClient, UserInput};
use kiln::cli::{AskArgs, Cli, Commands, KeysArgs, SettingsArgs, SettingsCommands};
use kiln::config::{RunnerKind, Settings};
use kiln::error::Result;
use kiln::llm::provider::LlmProvider;
use kiln::llm::providers::gemini::GeminiProvider;
use kiln::store::{FileStore, KeyValueStore};
use kiln::tools::editor::{EditorSurface, InMemoryEditor};
use kiln::tools::formatter::{FormatterWorker, PrettierFormatter};
use kiln::tools::runner::{CommandRunner, HttpCommandRunner, LocalCommandRunner};
use kiln::tools::ToolContext;

#[path = "main/repl.rs"]
mod repl;
#[path = "main/terminal.rs"]
mod terminal;

use terminal::TerminalObserver;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on the exchange and tool diagnostics. `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        let level = if cli.verbose > 1 { "trace" } else { "debug" };
        for target in ["kiln.chat.engine", "kiln.tools"] {
            if let Ok(parsed) = format!("{}={}", target, level).parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = cli.settings_path();
    let mut settings = Settings::load_from(&settings_path)?;
    cli.apply_overrides(&mut settings);

    if let Some(Commands::Settings(args)) = &cli.command {
        return run_settings_command(args, &settings, &settings_path);
    }
    for warning in settings.validate() {
        tracing::warn!("{}", warning);
    }

    let mut client = build_client(&settings)?;
    match &cli.project {
        Some(path) => {
            client.open_project(path)?;
        }
        None => {
            client.restore_project()?;
        }
    }

    match cli.command {
        None | Some(Commands::Chat) => repl::run(&mut client).await,
        Some(Commands::Ask(args)) => run_ask(&mut client, args).await,
        Some(Commands::Keys(args)) => run_keys(&mut client, args),
        Some(Commands::Settings(_)) => Ok(()),
    }
}

/// Wire the store, editor, runner, formatter and provider into a client
fn build_client(settings: &Settings) -> Result<ChatClient> {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(settings.storage_dir())?);
    let editor: Arc<dyn EditorSurface> = Arc::new(InMemoryEditor::new());
    let runner: Arc<dyn CommandRunner> = match settings.tools.runner {
        RunnerKind::Local => Arc::new(LocalCommandRunner::new()),
        RunnerKind::Http => Arc::new(HttpCommandRunner::new(
            settings.tools.endpoint.clone().unwrap_or_default(),
        )),
    };
    let prettier = match &settings.tools.prettier {
        Some(path) => PrettierFormatter::new(path),
        None => PrettierFormatter::default(),
    };
    let formatter = FormatterWorker::spawn(Arc::new(prettier), editor.clone(), None);
    let context = ToolContext::new(editor, runner, store).with_formatter(formatter);

    let provider: Arc<dyn LlmProvider> = match settings.gemini_base_url() {
        Some(url) => Arc::new(GeminiProvider::with_base_url(url)),
        None => Arc::new(GeminiProvider::new()),
    };
    ChatClient::new(provider, context, settings)
}

/// Run a single prompt and print the answer
async fn run_ask(client: &mut ChatClient, args: AskArgs) -> Result<()> {
    let mut input = UserInput::text(args.prompt);
    if let Some(image) = &args.image {
        input = input.with_image_file(image)?;
    }
    let mut observer = TerminalObserver::new();
    client.send(input, &mut observer).await?;
    Ok(())
}

/// Replace the stored keys with the lines of a file or stdin
fn run_keys(client: &mut ChatClient, args: KeysArgs) -> Result<()> {
    let text = match &args.file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    let count = client.save_credentials(&text)?;
    println!("Saved {} API key(s).", count);
    Ok(())
}

fn run_settings_command(args: &SettingsArgs, settings: &Settings, path: &Path) -> Result<()> {
    match args.command {
        None | Some(SettingsCommands::Show) => {
            println!("{}", serde_json::to_string_pretty(settings)?);
        }
        Some(SettingsCommands::Path) => println!("{}", path.display()),
        Some(SettingsCommands::Validate) => {
            let warnings = settings.validate();
            if warnings.is_empty() {
                println!("Settings OK.");
            }
            for warning in warnings {
                println!("warning: {}", warning);
            }
        }
    }
    Ok(())
}
