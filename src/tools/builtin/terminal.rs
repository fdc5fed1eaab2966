// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Terminal-backed tools
//!
//! Both delegate to the context's command runner; a runner failure surfaces
//! its message unchanged.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext};

/// Commands run from the project root when one is bound
fn working_directory(context: &ToolContext) -> Option<PathBuf> {
    context
        .project()
        .ok()
        .and_then(|tree| tree.root_path().map(|p| p.to_path_buf()))
}

/// Single-quote an argument for `sh`
fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

pub struct RunTerminalCommandTool;

#[async_trait]
impl Tool for RunTerminalCommandTool {
    fn name(&self) -> &str {
        "run_terminal_command"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "run_terminal_command".to_string(),
            description: "Executes a shell command on the backend and returns the output.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("command", "The shell command to run", true)
                .build(),
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let command = required_str(&input, "command")?;
        let cwd = working_directory(context);
        let output = context.runner.run(command, cwd.as_deref()).await?;
        Ok(json!({ "output": output }))
    }
}

pub struct FileHistoryTool;

impl FileHistoryTool {
    pub fn command_for(filename: &str) -> String {
        format!(
            "git log --pretty=format:\"%h - %an, %ar : %s\" -- {}",
            shell_quote(filename)
        )
    }
}

#[async_trait]
impl Tool for FileHistoryTool {
    fn name(&self) -> &str {
        "get_file_history"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_file_history".to_string(),
            description: "Retrieves the git commit history for a specific file.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("filename", "Path of the file", true)
                .build(),
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let filename = required_str(&input, "filename")?;
        let cwd = working_directory(context);
        let history = context
            .runner
            .run(&Self::command_for(filename), cwd.as_deref())
            .await?;
        Ok(json!({ "history": history }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KilnError;
    use crate::store::MemoryStore;
    use crate::tools::builtin::test_support::bound_context;
    use crate::tools::editor::InMemoryEditor;
    use crate::tools::runner::CommandRunner;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Records commands and answers with a canned result
    struct RecordingRunner {
        commands: Mutex<Vec<String>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, command: &str, _cwd: Option<&Path>) -> Result<String> {
            self.commands.lock().unwrap().push(command.to_string());
            match &self.fail_with {
                Some(message) => Err(KilnError::ToolEffect(message.clone())),
                None => Ok("ok".to_string()),
            }
        }
    }

    fn context_with(runner: Arc<RecordingRunner>) -> ToolContext {
        ToolContext::new(Arc::new(InMemoryEditor::new()), runner, Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_run_command_in_project_root() {
        let (temp_dir, ctx) = bound_context();
        std::fs::write(temp_dir.path().join("marker.txt"), "").unwrap();
        let out = RunTerminalCommandTool
            .execute(json!({"command": "ls"}), &ctx)
            .await
            .unwrap();
        assert!(out["output"].as_str().unwrap().contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_file_history_command() {
        let runner = Arc::new(RecordingRunner {
            commands: Mutex::new(Vec::new()),
            fail_with: None,
        });
        let ctx = context_with(runner.clone());
        let out = FileHistoryTool
            .execute(json!({"filename": "src/app.js"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, json!({"history": "ok"}));
        assert_eq!(
            runner.commands.lock().unwrap()[0],
            "git log --pretty=format:\"%h - %an, %ar : %s\" -- 'src/app.js'"
        );
    }

    #[tokio::test]
    async fn test_runner_failure_message_is_verbatim() {
        let runner = Arc::new(RecordingRunner {
            commands: Mutex::new(Vec::new()),
            fail_with: Some("Command not allowed".to_string()),
        });
        let ctx = context_with(runner);
        let err = RunTerminalCommandTool
            .execute(json!({"command": "rm -rf /"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Command not allowed");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("it's.js"), r"'it'\''s.js'");
    }
}
