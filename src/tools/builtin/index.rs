// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Codebase index tools

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{KilnError, Result};
use crate::indexer::{CodeIndex, CodebaseIndexer};
use crate::llm::provider::ToolDefinition;
use crate::tools::{no_argument_tool, required_str, SchemaBuilder, Tool, ToolContext};

use super::message;

pub struct BuildIndexTool;

#[async_trait]
impl Tool for BuildIndexTool {
    fn name(&self) -> &str {
        "build_or_update_codebase_index"
    }

    fn definition(&self) -> ToolDefinition {
        no_argument_tool(
            "build_or_update_codebase_index",
            "Scans the entire codebase to build a searchable index. Slow, run once per session.",
        )
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, _input: Value, context: &ToolContext) -> Result<Value> {
        let tree = context.project()?;
        let index = CodebaseIndexer::new()?.build(&*tree).await?;
        index.save(&*context.store)?;
        Ok(message("Codebase index built successfully.".to_string()))
    }
}

pub struct QueryCodebaseTool;

#[async_trait]
impl Tool for QueryCodebaseTool {
    fn name(&self) -> &str {
        "query_codebase"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "query_codebase".to_string(),
            description: "Searches the pre-built codebase index.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("query", "Symbol name or TODO text to look for", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let query = required_str(&input, "query")?;
        let index = CodeIndex::load(&*context.store)?.ok_or_else(|| {
            KilnError::ToolPrecondition(
                "No codebase index. Please run 'build_or_update_codebase_index'.".to_string(),
            )
        })?;
        Ok(json!({ "results": index.query(query) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::test_support::bound_context;

    #[tokio::test]
    async fn test_query_without_index() {
        let (_temp_dir, ctx) = bound_context();
        let err = QueryCodebaseTool
            .execute(json!({"query": "x"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No codebase index. Please run 'build_or_update_codebase_index'."
        );
    }

    #[tokio::test]
    async fn test_build_then_query() {
        let (temp_dir, ctx) = bound_context();
        std::fs::write(
            temp_dir.path().join("cart.js"),
            "class ShoppingCart {}\nfunction addToCart(item) {}\n// TODO: persist cart\n",
        )
        .unwrap();

        let out = BuildIndexTool.execute(json!({}), &ctx).await.unwrap();
        assert_eq!(out["message"], "Codebase index built successfully.");

        let out = QueryCodebaseTool
            .execute(json!({"query": "cart"}), &ctx)
            .await
            .unwrap();
        assert_eq!(
            out,
            json!({"results": [
                {"file": "cart.js", "type": "function", "name": "addToCart"},
                {"file": "cart.js", "type": "class", "name": "ShoppingCart"},
                {"file": "cart.js", "type": "todo", "name": "persist cart"},
            ]})
        );
    }
}
