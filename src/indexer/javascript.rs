// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! JavaScript structure analysis
//!
//! Parses a module with tree-sitter and lists its top-level function and
//! class declarations (exported ones included) and its imports.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

use crate::error::{KilnError, Result};

/// A declaration and its 1-based line span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationSpan {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub source: String,
    /// Local binding names
    pub specifiers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsAnalysis {
    pub functions: Vec<DeclarationSpan>,
    pub classes: Vec<DeclarationSpan>,
    pub imports: Vec<ImportInfo>,
}

/// Parse `source` as a JavaScript module and extract its structure
pub fn analyze(source: &str) -> Result<JsAnalysis> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_javascript::LANGUAGE.into())
        .map_err(|e| KilnError::Analysis(e.to_string()))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| KilnError::Analysis("Failed to parse source".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(1);
        return Err(KilnError::Analysis(format!("Syntax error near line {}", line)));
    }

    let bytes = source.as_bytes();
    let mut analysis = JsAnalysis::default();
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "export_statement" => {
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    record_declaration(declaration, bytes, &mut analysis);
                }
            }
            "import_statement" => {
                if let Some(import) = import_info(node, bytes) {
                    analysis.imports.push(import);
                }
            }
            _ => record_declaration(node, bytes, &mut analysis),
        }
    }
    Ok(analysis)
}

fn record_declaration(node: Node<'_>, bytes: &[u8], analysis: &mut JsAnalysis) {
    let target = match node.kind() {
        "function_declaration" | "generator_function_declaration" => &mut analysis.functions,
        "class_declaration" => &mut analysis.classes,
        _ => return,
    };
    if let Some(name) = node
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(bytes).ok())
    {
        target.push(DeclarationSpan {
            name: name.to_string(),
            start: node.start_position().row + 1,
            end: node.end_position().row + 1,
        });
    }
}

fn import_info(node: Node<'_>, bytes: &[u8]) -> Option<ImportInfo> {
    let source = node.child_by_field_name("source")?.utf8_text(bytes).ok()?;
    let source = source.trim_matches(|c| c == '"' || c == '\'').to_string();

    let mut specifiers = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "import_clause" {
            collect_bindings(child, bytes, &mut specifiers);
        }
    }
    Some(ImportInfo { source, specifiers })
}

/// Local names bound by an import clause, in source order
fn collect_bindings(clause: Node<'_>, bytes: &[u8], out: &mut Vec<String>) {
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => push_text(child, bytes, out),
            "namespace_import" => {
                let mut inner = child.walk();
                for id in child.named_children(&mut inner) {
                    if id.kind() == "identifier" {
                        push_text(id, bytes, out);
                    }
                }
            }
            "named_imports" => {
                let mut inner = child.walk();
                for spec in child.named_children(&mut inner) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    let local = spec
                        .child_by_field_name("alias")
                        .or_else(|| spec.child_by_field_name("name"));
                    if let Some(local) = local {
                        push_text(local, bytes, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_text(node: Node<'_>, bytes: &[u8], out: &mut Vec<String>) {
    if let Ok(text) = node.utf8_text(bytes) {
        out.push(text.trim_matches(|c| c == '"' || c == '\'').to_string());
    }
}

fn first_error_line(node: Node<'_>) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error_line)
}
