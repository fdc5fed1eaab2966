// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Lexical codebase index
//!
//! A best-effort regex scan over source files that records function and
//! class names plus `// TODO:` notes. The index is persisted in the
//! key-value store and queried by case-insensitive substring.

pub mod javascript;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{KilnError, Result};
use crate::store::{KeyValueStore, KEY_CODE_INDEX};
use crate::tools::project::{EntryKind, ProjectTree};

/// Folders never descended into
pub const IGNORED_DIRS: [&str; 4] = [".git", "node_modules", "dist", "build"];

/// File extensions that get indexed
pub const INDEXED_EXTENSIONS: [&str; 8] = ["js", "html", "css", "md", "json", "py", "java", "ts"];

/// One extracted definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Definition {
    Function { name: String },
    Class { name: String },
    Todo { content: String },
}

impl Definition {
    fn kind(&self) -> &'static str {
        match self {
            Definition::Function { .. } => "function",
            Definition::Class { .. } => "class",
            Definition::Todo { .. } => "todo",
        }
    }

    fn label(&self) -> &str {
        match self {
            Definition::Function { name } | Definition::Class { name } => name,
            Definition::Todo { content } => content,
        }
    }
}

/// A query hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMatch {
    pub file: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

/// Persisted index: definitions per root-relative file path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeIndex {
    pub built_at: DateTime<Utc>,
    pub files: BTreeMap<String, Vec<Definition>>,
}

impl CodeIndex {
    /// Case-insensitive substring match over names and TODO text
    pub fn query(&self, query: &str) -> Vec<IndexMatch> {
        let needle = query.to_lowercase();
        let mut results = Vec::new();
        for (file, definitions) in &self.files {
            for def in definitions {
                if def.label().to_lowercase().contains(&needle) {
                    results.push(IndexMatch {
                        file: file.clone(),
                        kind: def.kind().to_string(),
                        name: def.label().to_string(),
                    });
                }
            }
        }
        results
    }

    pub fn definition_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(KEY_CODE_INDEX, &serde_json::to_string(self)?)
    }

    /// Load the persisted index, if one was built
    pub fn load(store: &dyn KeyValueStore) -> Result<Option<Self>> {
        match store.get(KEY_CODE_INDEX)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

/// Builds a [`CodeIndex`] from a project tree
pub struct CodebaseIndexer {
    function_decl: Regex,
    arrow_function: Regex,
    class_decl: Regex,
    todo: Regex,
}

impl CodebaseIndexer {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| KilnError::Analysis(e.to_string()))
        };
        Ok(Self {
            function_decl: compile(r"function\s+([a-zA-Z0-9_]+)\s*\(")?,
            arrow_function: compile(r"const\s+([a-zA-Z0-9_]+)\s*=\s*(\(.*\)|async\s*\(.*\))\s*=>")?,
            class_decl: compile(r"class\s+([a-zA-Z0-9_]+)")?,
            todo: compile(r"//\s*TODO:(.*)")?,
        })
    }

    /// Extract definitions from one file's content
    pub fn parse_content(&self, content: &str) -> Vec<Definition> {
        let mut definitions = Vec::new();
        for regex in [&self.function_decl, &self.arrow_function] {
            for cap in regex.captures_iter(content) {
                definitions.push(Definition::Function {
                    name: cap[1].to_string(),
                });
            }
        }
        for cap in self.class_decl.captures_iter(content) {
            definitions.push(Definition::Class {
                name: cap[1].to_string(),
            });
        }
        for cap in self.todo.captures_iter(content) {
            definitions.push(Definition::Todo {
                content: cap[1].trim().to_string(),
            });
        }
        definitions
    }

    /// Walk the tree and index every eligible file
    pub async fn build(&self, tree: &dyn ProjectTree) -> Result<CodeIndex> {
        let mut files = BTreeMap::new();
        for entry in tree.list().await? {
            if entry.kind != EntryKind::File || !is_indexable(&entry.path) {
                continue;
            }
            match tree.read_to_string(&entry.path).await {
                Ok(content) => {
                    files.insert(entry.path.clone(), self.parse_content(&content));
                }
                Err(e) => {
                    tracing::warn!(target: "kiln.indexer", path = %entry.path, error = %e, "could not index file");
                }
            }
        }

        let index = CodeIndex {
            built_at: Utc::now(),
            files,
        };
        tracing::info!(
            target: "kiln.indexer",
            files = index.files.len(),
            definitions = index.definition_count(),
            "codebase index built"
        );
        Ok(index)
    }
}

fn is_indexable(path: &str) -> bool {
    let mut segments: Vec<&str> = path.split('/').collect();
    let Some(file_name) = segments.pop() else {
        return false;
    };
    if segments.iter().any(|s| IGNORED_DIRS.contains(s)) {
        return false;
    }
    match file_name.rsplit_once('.') {
        Some((_, ext)) => INDEXED_EXTENSIONS.contains(&ext),
        None => false,
    }
}
