// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Format tool. Hands the file to the background formatter and returns.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::formatter::{FormatParser, FormatRequest};
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext};

use super::{document_key, message};

pub struct FormatCodeTool;

#[async_trait]
impl Tool for FormatCodeTool {
    fn name(&self) -> &str {
        "format_code"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "format_code".to_string(),
            description: "Formats a specific file using the code formatter.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("filename", "Path of the file to format", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let filename = required_str(&input, "filename")?;
        let tree = context.project()?;
        let path = document_key(&*tree, filename)?;
        let code = tree.read_to_string(&path).await?;
        let parser = FormatParser::for_path(&path);

        context.formatter()?.submit(FormatRequest {
            path,
            code,
            parser,
            project: tree,
        })?;
        Ok(message(format!("Formatting request for '{}' sent.", filename)))
    }
}
