// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool execution engine
//!
//! Maps a function call to one registered tool and folds every failure into
//! the result payload. Nothing escapes as an `Err`.

use futures::future::join_all;
use std::sync::Arc;

use crate::llm::message::FunctionCall;
use crate::llm::provider::ToolDefinition;

use super::{ToolContext, ToolRegistry, ToolResult};

/// Tool executor bound to one registry and context
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, context: ToolContext) -> Self {
        Self {
            registry: Arc::new(registry),
            context,
        }
    }

    /// Get tool definitions for the model
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one call. The outcome, both returned and logged, reflects
    /// whether the tool actually succeeded.
    pub async fn execute(&self, call: &FunctionCall) -> ToolResult {
        let name = call.name.as_str();
        tracing::info!(target: "kiln.tools", tool = name, args = %call.args, "tool call");

        let outcome = match self.registry.get(name) {
            None => Err(format!("Unknown tool '{}'.", name)),
            Some(tool) => {
                let precondition = if tool.requires_project() {
                    self.context.project().err()
                } else {
                    None
                };
                match precondition {
                    Some(e) => Err(e.to_string()),
                    None => tool
                        .execute(call.args.clone(), &self.context)
                        .await
                        .map_err(|e| e.to_string()),
                }
            }
        };

        let result = match outcome {
            Ok(payload) => ToolResult::success(name, call.id.clone(), payload),
            Err(message) => ToolResult::error(
                name,
                call.id.clone(),
                format!("Error executing tool '{}': {}", name, message),
            ),
        };

        if result.is_error() {
            tracing::warn!(target: "kiln.tools", tool = name, result = %result.envelope(), "tool failed");
        } else {
            tracing::info!(target: "kiln.tools", tool = name, "tool succeeded");
            tracing::debug!(target: "kiln.tools", tool = name, result = %result.envelope(), "tool result");
        }
        result
    }

    /// Execute a batch concurrently. Results come back in call order.
    pub async fn execute_all(&self, calls: &[FunctionCall]) -> Vec<ToolResult> {
        join_all(calls.iter().map(|call| self.execute(call))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tools::editor::InMemoryEditor;
    use crate::tools::project::FsProjectTree;
    use crate::tools::runner::LocalCommandRunner;
    use crate::tools::ToolOutcome;
    use serde_json::json;
    use tempfile::TempDir;

    fn executor() -> ToolExecutor {
        let context = ToolContext::new(
            Arc::new(InMemoryEditor::new()),
            Arc::new(LocalCommandRunner::new()),
            Arc::new(MemoryStore::new()),
        );
        ToolExecutor::new(ToolRegistry::with_builtins(), context)
    }

    fn call(name: &str, args: serde_json::Value) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            args,
            id: None,
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_payload() {
        let result = executor().execute(&call("fly", json!({}))).await;
        assert_eq!(
            result.outcome,
            ToolOutcome::Error("Error executing tool 'fly': Unknown tool 'fly'.".to_string())
        );
    }

    #[tokio::test]
    async fn test_project_precondition() {
        let result = executor()
            .execute(&call("read_file", json!({"filename": "a.txt"})))
            .await;
        assert_eq!(
            result.response(),
            json!({"error": "Error executing tool 'read_file': No project folder is open. Ask the user to open one."})
        );
    }

    #[tokio::test]
    async fn test_editor_tools_do_not_need_project() {
        let exec = executor();
        let result = exec.execute(&call("get_selected_text", json!({}))).await;
        assert_eq!(
            result.response()["error"],
            "Error executing tool 'get_selected_text': No text is currently selected."
        );
    }

    #[tokio::test]
    async fn test_missing_argument_is_error_payload() {
        let temp_dir = TempDir::new().unwrap();
        let exec = executor();
        exec.context()
            .bind_project(Arc::new(FsProjectTree::open(temp_dir.path()).unwrap()));
        let result = exec.execute(&call("read_file", json!({}))).await;
        assert!(result.is_error());
        assert!(result.response()["error"]
            .as_str()
            .unwrap()
            .contains("'filename' is required"));
    }

    #[tokio::test]
    async fn test_execute_all_keeps_order_for_same_name() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "A").unwrap();
        std::fs::write(temp_dir.path().join("b.txt"), "B").unwrap();
        let exec = executor();
        exec.context()
            .bind_project(Arc::new(FsProjectTree::open(temp_dir.path()).unwrap()));

        let calls = vec![
            call("read_file", json!({"filename": "b.txt"})),
            call("read_file", json!({"filename": "missing.txt"})),
            call("read_file", json!({"filename": "a.txt"})),
        ];
        let results = exec.execute_all(&calls).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].response(), json!({"content": "B"}));
        assert!(results[1].is_error());
        assert_eq!(results[2].response(), json!({"content": "A"}));
    }
}
