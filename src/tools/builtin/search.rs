// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Code search tool
//!
//! Case-insensitive substring search over every text file in the project.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{KilnError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::project::{EntryKind, ProjectTree};
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineMatch {
    pub line_number: usize,
    pub line_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMatches {
    pub file: String,
    pub matches: Vec<LineMatch>,
}

/// Search every readable file; files are visited in path order
pub async fn search_tree(tree: &dyn ProjectTree, term: &str) -> Result<Vec<FileMatches>> {
    let needle = term.to_lowercase();
    let mut results = Vec::new();

    for entry in tree.list().await? {
        if entry.kind != EntryKind::File {
            continue;
        }
        let content = match tree.read_to_string(&entry.path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(target: "kiln.tools", path = %entry.path, error = %e, "could not search file");
                continue;
            }
        };

        let matches: Vec<LineMatch> = content
            .split('\n')
            .enumerate()
            .filter(|(_, line)| line.to_lowercase().contains(&needle))
            .map(|(i, line)| LineMatch {
                line_number: i + 1,
                line_content: line.trim().to_string(),
            })
            .collect();

        if !matches.is_empty() {
            results.push(FileMatches {
                file: entry.path,
                matches,
            });
        }
    }
    Ok(results)
}

pub struct SearchCodeTool;

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        "search_code"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_code".to_string(),
            description: "Searches for a specific string in all files in the project (like grep).".to_string(),
            input_schema: SchemaBuilder::new()
                .string("search_term", "Text to search for (case-insensitive)", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let term = required_str(&input, "search_term")?;
        if term.is_empty() {
            return Err(KilnError::InvalidInput("'search_term' must not be empty".to_string()));
        }
        let results = search_tree(&*context.project()?, term).await?;
        Ok(json!({ "results": results }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::test_support::bound_context;

    #[tokio::test]
    async fn test_search_finds_single_match() {
        let (temp_dir, ctx) = bound_context();
        std::fs::write(temp_dir.path().join("x.txt"), "a foo b").unwrap();
        std::fs::write(temp_dir.path().join("y.txt"), "bar").unwrap();

        let out = SearchCodeTool
            .execute(json!({"search_term": "foo"}), &ctx)
            .await
            .unwrap();
        assert_eq!(
            out,
            json!({"results": [
                {"file": "x.txt", "matches": [{"line_number": 1, "line_content": "a foo b"}]}
            ]})
        );
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_trims() {
        let (temp_dir, ctx) = bound_context();
        std::fs::create_dir_all(temp_dir.path().join("src")).unwrap();
        std::fs::write(
            temp_dir.path().join("src/app.js"),
            "line one\n    const Needle = 1;\nnothing\nNEEDLE again\n",
        )
        .unwrap();

        let out = SearchCodeTool
            .execute(json!({"search_term": "needle"}), &ctx)
            .await
            .unwrap();
        let matches = &out["results"][0]["matches"];
        assert_eq!(out["results"][0]["file"], "src/app.js");
        assert_eq!(matches[0]["line_number"], 2);
        assert_eq!(matches[0]["line_content"], "const Needle = 1;");
        assert_eq!(matches[1]["line_number"], 4);
    }

    #[tokio::test]
    async fn test_search_skips_binary_files() {
        let (temp_dir, ctx) = bound_context();
        std::fs::write(temp_dir.path().join("blob.bin"), [0xffu8, 0xfe, b'f', b'o', b'o']).unwrap();
        std::fs::write(temp_dir.path().join("text.txt"), "foo").unwrap();

        let out = SearchCodeTool
            .execute(json!({"search_term": "foo"}), &ctx)
            .await
            .unwrap();
        let results = out["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["file"], "text.txt");
    }

    #[tokio::test]
    async fn test_search_rejects_empty_term() {
        let (_temp_dir, ctx) = bound_context();
        assert!(SearchCodeTool
            .execute(json!({"search_term": ""}), &ctx)
            .await
            .is_err());
    }
}
