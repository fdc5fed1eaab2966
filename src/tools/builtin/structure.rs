// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Project structure tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::project::{EntryKind, TreeEntry};
use crate::tools::{no_argument_tool, Tool, ToolContext};

pub struct ProjectStructureTool;

#[async_trait]
impl Tool for ProjectStructureTool {
    fn name(&self) -> &str {
        "get_project_structure"
    }

    fn definition(&self) -> ToolDefinition {
        no_argument_tool(
            "get_project_structure",
            "Gets the entire file and folder structure of the project. CRITICAL: Always use this tool before attempting to read or create a file to ensure you have the correct file path.",
        )
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, _input: Value, context: &ToolContext) -> Result<Value> {
        let tree = context.project()?;
        let entries = tree.list().await?;
        let structure = format!("{}\n{}", tree.root_name(), render_tree(&entries));
        Ok(json!({ "structure": structure }))
    }
}

/// Render entries as an ASCII tree, folders first, names case-insensitive
pub fn render_tree(entries: &[TreeEntry]) -> String {
    let mut children: HashMap<&str, Vec<&TreeEntry>> = HashMap::new();
    for entry in entries {
        let parent = entry.path.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        children.entry(parent).or_default().push(entry);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| {
            let folder_first = (a.kind != EntryKind::Directory).cmp(&(b.kind != EntryKind::Directory));
            folder_first
                .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
                .then_with(|| a.name().cmp(b.name()))
        });
    }

    let mut out = String::new();
    render_level(&children, "", "", &mut out);
    out
}

fn render_level(
    children: &HashMap<&str, Vec<&TreeEntry>>,
    parent: &str,
    prefix: &str,
    out: &mut String,
) {
    let Some(siblings) = children.get(parent) else {
        return;
    };
    for (i, entry) in siblings.iter().enumerate() {
        let last = i + 1 == siblings.len();
        out.push_str(prefix);
        out.push_str(if last { "└── " } else { "├── " });
        out.push_str(entry.name());
        out.push('\n');
        if entry.kind == EntryKind::Directory {
            let nested = format!("{}{}", prefix, if last { "    " } else { "│   " });
            render_level(children, &entry.path, &nested, out);
        }
    }
}
