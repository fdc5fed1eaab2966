// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Unified diff tool
//!
//! Models often emit diffs with HTML entities or `\xNN` escapes left in, and
//! with CRLF line endings. Those are decoded before the patch is parsed.

use async_trait::async_trait;
use diffy::Patch;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::{KilnError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolContext};

use super::{document_key, message};

/// Decode HTML entities, then `\xNN` escapes
pub fn decode_escapes(text: &str) -> Result<String> {
    let decoded = html_escape::decode_html_entities(text);
    let hex = Regex::new(r"\\x([0-9a-fA-F]{2})")
        .map_err(|e| KilnError::Analysis(e.to_string()))?;

    let decoded = hex.replace_all(&decoded, |caps: &Captures<'_>| {
        u8::from_str_radix(&caps[1], 16)
            .map(|b| char::from(b).to_string())
            .unwrap_or_else(|_| caps[0].to_string())
    });
    Ok(decoded.into_owned())
}

/// Apply a unified diff to `original`. CRLF is normalized on both sides.
pub fn apply_unified_diff(original: &str, diff: &str) -> Result<String> {
    let original = original.replace("\r\n", "\n");
    let mut diff = decode_escapes(&diff.replace("\r\n", "\n"))?;
    if !diff.ends_with('\n') {
        diff.push('\n');
    }
    let patch = Patch::from_str(&diff).map_err(|e| {
        tracing::debug!(target: "kiln.tools", error = %e, "diff did not parse");
        KilnError::Patch
    })?;
    diffy::apply(&original, &patch).map_err(|e| {
        tracing::debug!(target: "kiln.tools", error = %e, "diff did not apply");
        KilnError::Patch
    })
}

pub struct ApplyDiffTool;

#[async_trait]
impl Tool for ApplyDiffTool {
    fn name(&self) -> &str {
        "apply_diff"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "apply_diff".to_string(),
            description: "Applies a unified diff patch to an existing file. Prefer rewrite_file unless the change is small and the diff is exact.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("filename", "Path of the file to patch", true)
                .string("diff", "Unified diff to apply", true)
                .build(),
        }
    }

    fn requires_project(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<Value> {
        let filename = required_str(&input, "filename")?;
        let diff = required_str(&input, "diff")?;
        let tree = context.project()?;
        let key = document_key(&*tree, filename)?;

        let original = tree.read_to_string(&key).await?;
        let patched = apply_unified_diff(&original, diff)?;
        tree.write(&key, patched.as_bytes()).await?;
        context.editor.set_content(&key, &patched);

        Ok(message(format!("Patch applied to '{}' successfully.", filename)))
    }
}
