// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Project tree store
//!
//! All tool paths are relative to the bound project root. The tree offers
//! read, write, delete, create-directory and recursive listing; moves are
//! built on top as copy-then-delete.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{KilnError, Result};

/// Kind of an entry in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry from a recursive listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Root-relative path with `/` separators
    pub path: String,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Hierarchical, path-addressed storage for the open project
#[async_trait]
pub trait ProjectTree: Send + Sync {
    /// Display name of the root folder
    fn root_name(&self) -> String;

    /// Absolute location of the root, when backed by a real directory
    fn root_path(&self) -> Option<&Path> {
        None
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Create the file (and missing parent folders) or replace its content
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;

    async fn delete_file(&self, path: &str) -> Result<()>;

    /// Remove a folder and everything under it
    async fn delete_dir(&self, path: &str) -> Result<()>;

    /// Create a folder, including missing intermediate folders
    async fn create_dir(&self, path: &str) -> Result<()>;

    async fn kind(&self, path: &str) -> Result<Option<EntryKind>>;

    /// Every entry below the root, depth-first, siblings ordered by name
    async fn list(&self) -> Result<Vec<TreeEntry>>;

    async fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes)
            .map_err(|_| KilnError::ToolEffect(format!("File '{}' is not valid UTF-8 text.", path)))
    }
}

/// Normalize a tool-supplied path to root-relative `a/b/c` form.
///
/// Empty and `.` segments are dropped, a leading `/` is ignored and an
/// absolute path under `root` is made relative. `..` is rejected.
pub fn normalize_path(path: &str, root: Option<&Path>) -> Result<String> {
    let mut candidate = path.trim().replace('\\', "/");

    if let Some(root) = root {
        let root_str = root.to_string_lossy().replace('\\', "/");
        let root_str = root_str.trim_end_matches('/');
        if !root_str.is_empty() {
            if let Some(rest) = candidate.strip_prefix(root_str) {
                if rest.is_empty() || rest.starts_with('/') {
                    candidate = rest.to_string();
                }
            }
        }
    }

    let mut segments = Vec::new();
    for segment in candidate.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(KilnError::ToolEffect(format!(
                    "Path '{}' escapes the project root.",
                    path
                )))
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// A project tree backed by a local directory
#[derive(Debug, Clone)]
pub struct FsProjectTree {
    root: PathBuf,
}

impl FsProjectTree {
    /// Bind to an existing directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(KilnError::InvalidInput(format!(
                "'{}' is not a directory",
                root.display()
            )));
        }
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    /// Resolve a tool path to an absolute location under the root
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = normalize_path(path, Some(&self.root))?;
        let mut resolved = self.root.clone();
        for component in Path::new(&relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                _ => {
                    return Err(KilnError::ToolEffect(format!(
                        "Invalid path '{}'.",
                        path
                    )))
                }
            }
        }
        Ok(resolved)
    }

    fn resolve_entry(&self, path: &str) -> Result<PathBuf> {
        let resolved = self.resolve(path)?;
        if resolved == self.root {
            return Err(KilnError::ToolEffect(
                "Invalid path provided. Cannot operate on the project root.".to_string(),
            ));
        }
        Ok(resolved)
    }
}

fn not_found(what: &str, path: &str) -> KilnError {
    KilnError::ToolEffect(format!("{} '{}' not found.", what, path))
}

#[async_trait]
impl ProjectTree for FsProjectTree {
    fn root_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    fn root_path(&self) -> Option<&Path> {
        Some(&self.root)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let resolved = self.resolve_entry(path)?;
        if !resolved.is_file() {
            return Err(not_found("File", path));
        }
        Ok(tokio::fs::read(&resolved).await?)
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let resolved = self.resolve_entry(path)?;
        if resolved.is_dir() {
            return Err(KilnError::ToolEffect(format!(
                "'{}' is a folder, not a file.",
                path
            )));
        }
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, content).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let resolved = self.resolve_entry(path)?;
        if !resolved.is_file() {
            return Err(not_found("File", path));
        }
        tokio::fs::remove_file(&resolved).await?;
        Ok(())
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        let resolved = self.resolve_entry(path)?;
        if !resolved.is_dir() {
            return Err(not_found("Folder", path));
        }
        tokio::fs::remove_dir_all(&resolved).await?;
        Ok(())
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let resolved = self.resolve_entry(path)?;
        if resolved.is_file() {
            return Err(KilnError::ToolEffect(format!(
                "'{}' already exists as a file.",
                path
            )));
        }
        tokio::fs::create_dir_all(&resolved).await?;
        Ok(())
    }

    async fn kind(&self, path: &str) -> Result<Option<EntryKind>> {
        let resolved = self.resolve(path)?;
        let kind = if resolved.is_dir() {
            Some(EntryKind::Directory)
        } else if resolved.is_file() {
            Some(EntryKind::File)
        } else {
            None
        };
        Ok(kind)
    }

    async fn list(&self) -> Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(target: "kiln.tools", error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let kind = if entry.file_type().is_dir() {
                EntryKind::Directory
            } else if entry.file_type().is_file() {
                EntryKind::File
            } else {
                continue;
            };
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(TreeEntry { path, kind });
        }
        Ok(entries)
    }
}
