// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Editor surface
//!
//! Open documents keyed by root-relative path, the active document and its
//! selection. Tools reach the editor only through [`EditorSurface`].

use std::sync::{Mutex, MutexGuard};

use crate::error::{KilnError, Result};

/// Byte range selected in the active document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

pub trait EditorSurface: Send + Sync {
    /// Open (or focus) a document. An already-open document keeps its buffer.
    fn open(&self, path: &str, content: &str);

    fn is_open(&self, path: &str) -> bool;

    fn content(&self, path: &str) -> Option<String>;

    /// Replace the buffer of an open document. Returns false if not open.
    fn set_content(&self, path: &str, content: &str) -> bool;

    /// Close a document. Returns false if it was not open.
    fn close(&self, path: &str) -> bool;

    /// Close every document at or under `prefix`. Returns the closed paths.
    fn close_under(&self, prefix: &str) -> Vec<String>;

    /// Re-key every document at or under `old` to live under `new`.
    /// Returns the number of documents moved.
    fn rename_under(&self, old: &str, new: &str) -> usize;

    fn close_all(&self);

    fn open_paths(&self) -> Vec<String>;

    fn active_path(&self) -> Option<String>;

    /// Select a byte range in the active document
    fn select(&self, start: usize, end: usize) -> Result<()>;

    /// Selected text, or None when the selection is absent or empty
    fn selected_text(&self) -> Option<String>;

    /// Replace the current selection. Fails when nothing is selected.
    fn replace_selection(&self, text: &str) -> Result<()>;
}

/// Whether `path` is `prefix` itself or lies beneath it
pub fn is_at_or_under(path: &str, prefix: &str) -> bool {
    path == prefix
        || (path.len() > prefix.len()
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'/')
}

#[derive(Debug, Default)]
struct EditorState {
    documents: Vec<(String, String)>,
    active: Option<String>,
    selection: Option<Selection>,
}

impl EditorState {
    fn position(&self, path: &str) -> Option<usize> {
        self.documents.iter().position(|(p, _)| p == path)
    }

    fn focus(&mut self, path: &str) {
        if self.active.as_deref() != Some(path) {
            self.selection = None;
        }
        self.active = Some(path.to_string());
    }

    fn refocus_after_close(&mut self) {
        let still_open = self
            .active
            .as_ref()
            .is_some_and(|a| self.documents.iter().any(|(p, _)| p == a));
        if !still_open {
            self.active = self.documents.last().map(|(p, _)| p.clone());
            self.selection = None;
        }
    }
}

/// Editor held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryEditor {
    state: Mutex<EditorState>,
}

impl InMemoryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, EditorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl EditorSurface for InMemoryEditor {
    fn open(&self, path: &str, content: &str) {
        let mut state = self.state();
        if state.position(path).is_none() {
            state.documents.push((path.to_string(), content.to_string()));
        }
        state.focus(path);
    }

    fn is_open(&self, path: &str) -> bool {
        self.state().position(path).is_some()
    }

    fn content(&self, path: &str) -> Option<String> {
        let state = self.state();
        state.position(path).map(|i| state.documents[i].1.clone())
    }

    fn set_content(&self, path: &str, content: &str) -> bool {
        let mut state = self.state();
        let Some(i) = state.position(path) else {
            return false;
        };
        state.documents[i].1 = content.to_string();
        if state.active.as_deref() == Some(path) {
            state.selection = None;
        }
        true
    }

    fn close(&self, path: &str) -> bool {
        let mut state = self.state();
        let Some(i) = state.position(path) else {
            return false;
        };
        state.documents.remove(i);
        state.refocus_after_close();
        true
    }

    fn close_under(&self, prefix: &str) -> Vec<String> {
        let mut state = self.state();
        let mut closed = Vec::new();
        state.documents.retain(|(p, _)| {
            if is_at_or_under(p, prefix) {
                closed.push(p.clone());
                false
            } else {
                true
            }
        });
        state.refocus_after_close();
        closed
    }

    fn rename_under(&self, old: &str, new: &str) -> usize {
        let mut state = self.state();
        let remap = |p: &str| format!("{}{}", new, &p[old.len()..]);
        let mut moved = 0;
        for (path, _) in state.documents.iter_mut() {
            if is_at_or_under(path, old) {
                *path = remap(path);
                moved += 1;
            }
        }
        if let Some(active) = state.active.clone() {
            if is_at_or_under(&active, old) {
                state.active = Some(remap(&active));
            }
        }
        moved
    }

    fn close_all(&self) {
        let mut state = self.state();
        *state = EditorState::default();
    }

    fn open_paths(&self) -> Vec<String> {
        self.state().documents.iter().map(|(p, _)| p.clone()).collect()
    }

    fn active_path(&self) -> Option<String> {
        self.state().active.clone()
    }

    fn select(&self, start: usize, end: usize) -> Result<()> {
        let mut state = self.state();
        let active = state
            .active
            .clone()
            .ok_or_else(|| KilnError::ToolPrecondition("No file is currently open in the editor.".to_string()))?;
        let i = state
            .position(&active)
            .ok_or_else(|| KilnError::ToolPrecondition("No file is currently open in the editor.".to_string()))?;
        let content = &state.documents[i].1;
        if start > end
            || end > content.len()
            || !content.is_char_boundary(start)
            || !content.is_char_boundary(end)
        {
            return Err(KilnError::InvalidInput(format!(
                "selection {}..{} is out of range",
                start, end
            )));
        }
        state.selection = Some(Selection { start, end });
        Ok(())
    }

    fn selected_text(&self) -> Option<String> {
        let state = self.state();
        let selection = state.selection.filter(|s| !s.is_empty())?;
        let active = state.active.as_deref()?;
        let i = state.position(active)?;
        state.documents[i]
            .1
            .get(selection.start..selection.end)
            .map(str::to_string)
    }

    fn replace_selection(&self, text: &str) -> Result<()> {
        let mut state = self.state();
        let no_selection = || KilnError::ToolPrecondition("No text is selected to replace.".to_string());
        let selection = state.selection.filter(|s| !s.is_empty()).ok_or_else(no_selection)?;
        let active = state.active.clone().ok_or_else(no_selection)?;
        let i = state.position(&active).ok_or_else(no_selection)?;
        let content = &mut state.documents[i].1;
        if content.get(selection.start..selection.end).is_none() {
            return Err(no_selection());
        }
        content.replace_range(selection.start..selection.end, text);
        state.selection = None;
        Ok(())
    }
}
