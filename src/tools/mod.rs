// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for Kiln
//!
//! Tools are registered handlers invoked by name from model function calls.
//! Each one works against the explicit [`ToolContext`]: the bound project
//! tree, the editor surface, the command runner, the key-value store and the
//! formatter queue.

pub mod builtin;
pub mod definition;
pub mod editor;
pub mod executor;
pub mod formatter;
pub mod project;
pub mod runner;

pub use definition::*;
pub use executor::*;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{KilnError, Result};
use crate::llm::message::FunctionResponse;
use crate::llm::provider::ToolDefinition;
use crate::store::KeyValueStore;
use editor::EditorSurface;
use formatter::FormatterHandle;
use project::ProjectTree;
use runner::CommandRunner;

pub const NO_PROJECT_MESSAGE: &str = "No project folder is open. Ask the user to open one.";

/// Context provided to tools during execution
#[derive(Clone)]
pub struct ToolContext {
    project: Arc<RwLock<Option<Arc<dyn ProjectTree>>>>,
    /// Open documents and selection
    pub editor: Arc<dyn EditorSurface>,
    /// Terminal command backend
    pub runner: Arc<dyn CommandRunner>,
    /// Persistent key-value storage
    pub store: Arc<dyn KeyValueStore>,
    formatter: Option<FormatterHandle>,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("project", &self.project_name())
            .field("open_documents", &self.editor.open_paths().len())
            .field("has_formatter", &self.formatter.is_some())
            .finish()
    }
}

impl ToolContext {
    pub fn new(
        editor: Arc<dyn EditorSurface>,
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            project: Arc::new(RwLock::new(None)),
            editor,
            runner,
            store,
            formatter: None,
        }
    }

    /// Attach the formatter queue used by `format_code`
    pub fn with_formatter(mut self, formatter: FormatterHandle) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Bind a project tree. Replaces any previous binding.
    pub fn bind_project(&self, tree: Arc<dyn ProjectTree>) {
        let mut slot = match self.project.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(tree);
    }

    /// Forget the bound project and close every document
    pub fn unbind_project(&self) {
        {
            let mut slot = match self.project.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *slot = None;
        }
        self.editor.close_all();
    }

    /// The bound project tree, or the "no project" precondition error
    pub fn project(&self) -> Result<Arc<dyn ProjectTree>> {
        let slot = match self.project.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone()
            .ok_or_else(|| KilnError::ToolPrecondition(NO_PROJECT_MESSAGE.to_string()))
    }

    pub fn has_project(&self) -> bool {
        self.project().is_ok()
    }

    pub fn project_name(&self) -> Option<String> {
        self.project().ok().map(|p| p.root_name())
    }

    pub fn formatter(&self) -> Result<&FormatterHandle> {
        self.formatter
            .as_ref()
            .ok_or_else(|| KilnError::ToolEffect("Formatter worker is not running.".to_string()))
    }
}

/// Result of one tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Tool name, echoed back to the model
    pub name: String,
    /// Call id, when the model supplied one
    pub id: Option<String>,
    pub outcome: ToolOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    Error(String),
}

impl ToolResult {
    pub fn success(name: impl Into<String>, id: Option<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            id,
            outcome: ToolOutcome::Success(payload),
        }
    }

    pub fn error(name: impl Into<String>, id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id,
            outcome: ToolOutcome::Error(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error(_))
    }

    /// The payload sent to the model: the success value, or `{error}`
    pub fn response(&self) -> Value {
        match &self.outcome {
            ToolOutcome::Success(payload) => payload.clone(),
            ToolOutcome::Error(message) => json!({ "error": message }),
        }
    }

    pub fn to_function_response(&self) -> FunctionResponse {
        FunctionResponse {
            name: self.name.clone(),
            response: self.response(),
            id: self.id.clone(),
        }
    }

    /// `{toolResponse: {name, response}}` envelope used in logs
    pub fn envelope(&self) -> Value {
        json!({
            "toolResponse": {
                "name": self.name,
                "response": self.response(),
            }
        })
    }
}

/// Trait for implementing tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool definition for the model
    fn definition(&self) -> ToolDefinition;

    /// Whether the tool needs a bound project tree
    fn requires_project(&self) -> bool {
        false
    }

    /// Execute with the given arguments; the value is the success payload
    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value>;
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in tools
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(builtin::CreateFileTool));
        registry.register(Arc::new(builtin::DeleteFileTool));
        registry.register(Arc::new(builtin::CreateFolderTool));
        registry.register(Arc::new(builtin::DeleteFolderTool));
        registry.register(Arc::new(builtin::RenameFolderTool));
        registry.register(Arc::new(builtin::RenameFileTool));
        registry.register(Arc::new(builtin::ReadFileTool));
        registry.register(Arc::new(builtin::GetOpenFileContentTool));
        registry.register(Arc::new(builtin::GetSelectedTextTool));
        registry.register(Arc::new(builtin::ReplaceSelectedTextTool));
        registry.register(Arc::new(builtin::ProjectStructureTool));
        registry.register(Arc::new(builtin::SearchCodeTool));
        registry.register(Arc::new(builtin::RunTerminalCommandTool));
        registry.register(Arc::new(builtin::BuildIndexTool));
        registry.register(Arc::new(builtin::QueryCodebaseTool));
        registry.register(Arc::new(builtin::FileHistoryTool));
        registry.register(Arc::new(builtin::RewriteFileTool));
        registry.register(Arc::new(builtin::FormatCodeTool));
        registry.register(Arc::new(builtin::AnalyzeCodeTool));
        registry.register(Arc::new(builtin::ApplyDiffTool));

        registry
    }

    /// Register a tool; a tool with the same name is replaced in place
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Definitions in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.definition())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use editor::InMemoryEditor;
    use project::FsProjectTree;
    use runner::LocalCommandRunner;
    use tempfile::TempDir;

    fn context() -> ToolContext {
        ToolContext::new(
            Arc::new(InMemoryEditor::new()),
            Arc::new(LocalCommandRunner::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    #[test]
    fn test_registry_has_every_builtin_in_order() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 20);
        let names = registry.names();
        assert_eq!(names[0], "create_file");
        assert_eq!(names[19], "apply_diff");
        for name in [
            "rewrite_file",
            "get_project_structure",
            "search_code",
            "query_codebase",
            "get_file_history",
            "analyze_code",
        ] {
            assert!(registry.get(name).is_some(), "missing {}", name);
        }
        assert_eq!(registry.definitions().len(), 20);
    }

    #[test]
    fn test_register_replaces_without_duplicating_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(builtin::ReadFileTool));
        registry.register(Arc::new(builtin::ReadFileTool));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["read_file"]);
    }

    #[test]
    fn test_context_project_binding() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context();
        let err = ctx.project().err().unwrap();
        assert_eq!(err.to_string(), NO_PROJECT_MESSAGE);

        ctx.bind_project(Arc::new(FsProjectTree::open(temp_dir.path()).unwrap()));
        assert!(ctx.has_project());
        ctx.editor.open("a.txt", "");

        ctx.unbind_project();
        assert!(!ctx.has_project());
        assert!(ctx.editor.open_paths().is_empty());
    }

    #[test]
    fn test_context_clones_share_project() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context();
        let clone = ctx.clone();
        ctx.bind_project(Arc::new(FsProjectTree::open(temp_dir.path()).unwrap()));
        assert!(clone.has_project());
    }

    #[test]
    fn test_tool_result_payloads() {
        let ok = ToolResult::success("read_file", None, json!({"content": "x"}));
        assert!(!ok.is_error());
        assert_eq!(ok.response(), json!({"content": "x"}));
        assert_eq!(
            ok.envelope(),
            json!({"toolResponse": {"name": "read_file", "response": {"content": "x"}}})
        );

        let err = ToolResult::error("read_file", Some("c1".to_string()), "boom");
        assert!(err.is_error());
        let response = err.to_function_response();
        assert_eq!(response.response, json!({"error": "boom"}));
        assert_eq!(response.id.as_deref(), Some("c1"));
    }
}
