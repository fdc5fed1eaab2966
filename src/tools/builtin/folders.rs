// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Folder tools

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{KilnError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::editor::is_at_or_under;
use crate::tools::project::EntryKind;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext};

use super::{document_key, message};

pub struct CreateFolderTool;

#[async_trait]
impl Tool for CreateFolderTool {
    fn name(&self) -> &str {
        "create_folder"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "create_folder".to_string(),
            description: "Creates a new folder. IMPORTANT: Folder paths must be relative to the project root. Do NOT include the root folder's name in the path. Can create nested folders.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("folder_path", "Path of the folder to create", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let folder_path = required_str(&input, "folder_path")?;
        context.project()?.create_dir(folder_path).await?;
        Ok(message(format!("Folder '{}' created successfully.", folder_path)))
    }
}

pub struct DeleteFolderTool;

#[async_trait]
impl Tool for DeleteFolderTool {
    fn name(&self) -> &str {
        "delete_folder"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "delete_folder".to_string(),
            description: "Deletes a folder and all of its contents recursively.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("folder_path", "Path of the folder to delete", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let folder_path = required_str(&input, "folder_path")?;
        let tree = context.project()?;
        let key = document_key(&*tree, folder_path)?;
        tree.delete_dir(&key).await?;
        let closed = context.editor.close_under(&key);
        if !closed.is_empty() {
            tracing::debug!(target: "kiln.tools", folder = %key, closed = closed.len(), "closed documents under deleted folder");
        }
        Ok(message(format!("Folder '{}' deleted successfully.", folder_path)))
    }
}

pub struct RenameFolderTool;

#[async_trait]
impl Tool for RenameFolderTool {
    fn name(&self) -> &str {
        "rename_folder"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "rename_folder".to_string(),
            description: "Renames a folder.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("old_folder_path", "Current path of the folder", true)
                .string("new_folder_path", "New path of the folder", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let old_path = required_str(&input, "old_folder_path")?;
        let new_path = required_str(&input, "new_folder_path")?;
        let tree = context.project()?;
        let old_key = document_key(&*tree, old_path)?;
        let new_key = document_key(&*tree, new_path)?;

        if tree.kind(&old_key).await? != Some(EntryKind::Directory) || old_key.is_empty() {
            return Err(KilnError::ToolEffect(format!("Folder '{}' not found.", old_path)));
        }
        if is_at_or_under(&new_key, &old_key) {
            return Err(KilnError::ToolEffect(format!(
                "Cannot move folder '{}' into itself.",
                old_path
            )));
        }
        if tree.kind(&new_key).await?.is_some() {
            return Err(KilnError::ToolEffect(format!(
                "'{}' already exists.",
                new_path
            )));
        }

        // Copy the whole subtree, then drop the original.
        tree.create_dir(&new_key).await?;
        let prefix = format!("{}/", old_key);
        for entry in tree.list().await? {
            let Some(rest) = entry.path.strip_prefix(&prefix) else {
                continue;
            };
            let target = format!("{}/{}", new_key, rest);
            match entry.kind {
                EntryKind::Directory => tree.create_dir(&target).await?,
                EntryKind::File => {
                    let bytes = tree.read(&entry.path).await?;
                    tree.write(&target, &bytes).await?;
                }
            }
        }
        tree.delete_dir(&old_key).await?;
        context.editor.rename_under(&old_key, &new_key);

        Ok(message(format!(
            "Folder '{}' renamed to '{}' successfully.",
            old_path, new_path
        )))
    }
}
