// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Editor tools: the open document and the user's selection

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{KilnError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::{no_argument_tool, required_str, SchemaBuilder, Tool, ToolContext};

use super::message;

pub struct GetOpenFileContentTool;

#[async_trait]
impl Tool for GetOpenFileContentTool {
    fn name(&self) -> &str {
        "get_open_file_content"
    }

    fn definition(&self) -> ToolDefinition {
        no_argument_tool(
            "get_open_file_content",
            "Gets the content of the currently open file in the editor.",
        )
    }

    async fn execute(&self, _input: Value, context: &ToolContext) -> Result<Value> {
        let no_file = || KilnError::ToolPrecondition("No file is currently open in the editor.".to_string());
        let path = context.editor.active_path().ok_or_else(no_file)?;
        let content = context.editor.content(&path).ok_or_else(no_file)?;
        Ok(json!({ "filename": path, "content": content }))
    }
}

pub struct GetSelectedTextTool;

#[async_trait]
impl Tool for GetSelectedTextTool {
    fn name(&self) -> &str {
        "get_selected_text"
    }

    fn definition(&self) -> ToolDefinition {
        no_argument_tool(
            "get_selected_text",
            "Gets the text currently selected by the user in the editor.",
        )
    }

    async fn execute(&self, _input: Value, context: &ToolContext) -> Result<Value> {
        let selected = context
            .editor
            .selected_text()
            .ok_or_else(|| KilnError::ToolPrecondition("No text is currently selected.".to_string()))?;
        Ok(json!({ "selected_text": selected }))
    }
}

pub struct ReplaceSelectedTextTool;

#[async_trait]
impl Tool for ReplaceSelectedTextTool {
    fn name(&self) -> &str {
        "replace_selected_text"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "replace_selected_text".to_string(),
            description: "Replaces the currently selected text in the editor with new text.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("new_text", "Replacement text", true)
                .build(),
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let new_text = required_str(&input, "new_text")?;
        context.editor.replace_selection(new_text)?;
        Ok(message("Replaced the selected text.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::test_support::bound_context;

    #[tokio::test]
    async fn test_open_file_content() {
        let (_temp_dir, ctx) = bound_context();
        let err = GetOpenFileContentTool.execute(json!({}), &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "No file is currently open in the editor.");

        ctx.editor.open("main.js", "let a;");
        let out = GetOpenFileContentTool.execute(json!({}), &ctx).await.unwrap();
        assert_eq!(out, json!({"filename": "main.js", "content": "let a;"}));
    }

    #[tokio::test]
    async fn test_selection_round() {
        let (_temp_dir, ctx) = bound_context();
        ctx.editor.open("main.js", "let value = 1;");

        ctx.editor.select(4, 4).unwrap();
        assert!(GetSelectedTextTool.execute(json!({}), &ctx).await.is_err());
        let err = ReplaceSelectedTextTool
            .execute(json!({"new_text": "x"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No text is selected to replace.");

        ctx.editor.select(4, 9).unwrap();
        let out = GetSelectedTextTool.execute(json!({}), &ctx).await.unwrap();
        assert_eq!(out, json!({"selected_text": "value"}));

        let out = ReplaceSelectedTextTool
            .execute(json!({"new_text": "total"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out["message"], "Replaced the selected text.");
        assert_eq!(ctx.editor.content("main.js").as_deref(), Some("let total = 1;"));
    }
}
