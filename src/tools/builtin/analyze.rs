// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! JavaScript structure analysis tool

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{KilnError, Result};
use crate::indexer::javascript;
use crate::llm::provider::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext};

pub struct AnalyzeCodeTool;

#[async_trait]
impl Tool for AnalyzeCodeTool {
    fn name(&self) -> &str {
        "analyze_code"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "analyze_code".to_string(),
            description: "Analyzes the structure of a JavaScript file (.js) using an AST parser. CRITICAL: Use this tool for analyzing JavaScript code structure. For reading other file types like HTML, CSS, or plain text, use the 'read_file' tool instead.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("filename", "Path of the .js file", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let filename = required_str(&input, "filename")?;
        if !filename.ends_with(".js") {
            return Err(KilnError::ToolPrecondition(
                "This tool can only analyze .js files. Use read_file for others.".to_string(),
            ));
        }
        let source = context.project()?.read_to_string(filename).await?;
        let analysis = javascript::analyze(&source)?;
        Ok(json!({ "analysis": analysis }))
    }
}
