// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools for Kiln

mod analyze;
mod editor;
mod files;
mod folders;
mod format;
mod index;
mod patch;
mod search;
mod structure;
mod terminal;

pub use analyze::AnalyzeCodeTool;
pub use editor::{GetOpenFileContentTool, GetSelectedTextTool, ReplaceSelectedTextTool};
pub use files::{CreateFileTool, DeleteFileTool, ReadFileTool, RenameFileTool, RewriteFileTool};
pub use folders::{CreateFolderTool, DeleteFolderTool, RenameFolderTool};
pub use format::FormatCodeTool;
pub use index::{BuildIndexTool, QueryCodebaseTool};
pub use patch::ApplyDiffTool;
pub use search::SearchCodeTool;
pub use structure::ProjectStructureTool;
pub use terminal::{FileHistoryTool, RunTerminalCommandTool};

use serde_json::{json, Value};

use crate::error::Result;
use crate::tools::project::{normalize_path, ProjectTree};

/// `{message}` payload used by tools whose result is a confirmation
pub(crate) fn message(text: String) -> Value {
    json!({ "message": text })
}

/// Root-relative key for a tool path, used to address editor documents
pub(crate) fn document_key(tree: &dyn ProjectTree, path: &str) -> Result<String> {
    normalize_path(path, tree.root_path())
}
