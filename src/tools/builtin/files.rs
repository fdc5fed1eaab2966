// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! File tools
//!
//! Create, rewrite, read, delete and rename single files in the bound
//! project, keeping open editor documents in step.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{KilnError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::project::EntryKind;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext};

use super::{document_key, message};

const PATH_NOTE: &str = "IMPORTANT: File paths must be relative to the project root. Do NOT include the root folder's name in the path.";

/// Write full content and mirror it into the editor
async fn write_and_open(context: &ToolContext, filename: &str, content: &str) -> Result<()> {
    let tree = context.project()?;
    let key = document_key(&*tree, filename)?;
    tree.write(&key, content.as_bytes()).await?;
    context.editor.set_content(&key, content);
    context.editor.open(&key, content);
    Ok(())
}

pub struct CreateFileTool;

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "create_file".to_string(),
            description: format!(
                "Creates a new file. {} Always use get_project_structure first to check for existing files.",
                PATH_NOTE
            ),
            input_schema: SchemaBuilder::new()
                .string("filename", "Path of the file to create", true)
                .string("content", "Full content of the file", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let filename = required_str(&input, "filename")?;
        let content = required_str(&input, "content")?;
        write_and_open(context, filename, content).await?;
        Ok(message(format!("File '{}' created successfully.", filename)))
    }
}

pub struct RewriteFileTool;

#[async_trait]
impl Tool for RewriteFileTool {
    fn name(&self) -> &str {
        "rewrite_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "rewrite_file".to_string(),
            description: "Rewrites a file with new content. Overwrites the entire existing file content. IMPORTANT: Use for all file modifications instead of apply_diff.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("filename", "Path of the file to rewrite", true)
                .string("content", "New full content of the file", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let filename = required_str(&input, "filename")?;
        let content = required_str(&input, "content")?;
        write_and_open(context, filename, content).await?;
        Ok(message(format!("File '{}' rewritten successfully.", filename)))
    }
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".to_string(),
            description: format!(
                "Reads the content of an existing file. {} Always use get_project_structure first to get the correct file path.",
                PATH_NOTE
            ),
            input_schema: SchemaBuilder::new()
                .string("filename", "Path of the file to read", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let filename = required_str(&input, "filename")?;
        let content = context.project()?.read_to_string(filename).await?;
        Ok(json!({ "content": content }))
    }
}

pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "delete_file".to_string(),
            description: format!(
                "Deletes a file. {} CRITICAL: Use get_project_structure first to ensure the file exists.",
                PATH_NOTE
            ),
            input_schema: SchemaBuilder::new()
                .string("filename", "Path of the file to delete", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let filename = required_str(&input, "filename")?;
        let tree = context.project()?;
        let key = document_key(&*tree, filename)?;
        tree.delete_file(&key).await?;
        context.editor.close(&key);
        Ok(message(format!("File '{}' deleted successfully.", filename)))
    }
}

pub struct RenameFileTool;

#[async_trait]
impl Tool for RenameFileTool {
    fn name(&self) -> &str {
        "rename_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "rename_file".to_string(),
            description: "Renames a file.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("old_path", "Current path of the file", true)
                .string("new_path", "New path of the file", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let old_path = required_str(&input, "old_path")?;
        let new_path = required_str(&input, "new_path")?;
        let tree = context.project()?;
        let old_key = document_key(&*tree, old_path)?;
        let new_key = document_key(&*tree, new_path)?;

        if old_key == new_key {
            return Err(KilnError::ToolEffect(
                "The old and new paths are the same.".to_string(),
            ));
        }
        if tree.kind(&old_key).await? != Some(EntryKind::File) {
            return Err(KilnError::ToolEffect(format!("File '{}' not found.", old_path)));
        }
        if tree.kind(&new_key).await?.is_some() {
            return Err(KilnError::ToolEffect(format!(
                "'{}' already exists.",
                new_path
            )));
        }

        // Copy, then remove the original.
        let bytes = tree.read(&old_key).await?;
        tree.write(&new_key, &bytes).await?;
        tree.delete_file(&old_key).await?;
        context.editor.rename_under(&old_key, &new_key);

        Ok(message(format!(
            "File '{}' renamed to '{}' successfully.",
            old_path, new_path
        )))
    }
}
