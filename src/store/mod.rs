// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Persistent key-value store
//!
//! Holds the credential list, the remembered project root and the cached
//! code index. [`FileStore`] keeps one file per key under a directory;
//! [`MemoryStore`] backs tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{KilnError, Result};

/// Newline-delimited API credentials
pub const KEY_API_KEYS: &str = "api_keys";
/// Absolute path of the last opened project
pub const KEY_ROOT_DIRECTORY: &str = "root_directory";
/// Serialized code index
pub const KEY_CODE_INDEX: &str = "code_index";

/// String-valued key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Directory-backed store, one file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(KilnError::Store(format!("invalid key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.dat", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        // Replace atomically.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| KilnError::Store("store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().join("store")).unwrap();

        assert_eq!(store.get(KEY_API_KEYS).unwrap(), None);
        store.set(KEY_API_KEYS, "a\nb\n").unwrap();
        assert_eq!(store.get(KEY_API_KEYS).unwrap().as_deref(), Some("a\nb\n"));

        store.set(KEY_API_KEYS, "c").unwrap();
        assert_eq!(store.get(KEY_API_KEYS).unwrap().as_deref(), Some("c"));

        store.remove(KEY_API_KEYS).unwrap();
        assert_eq!(store.get(KEY_API_KEYS).unwrap(), None);
        store.remove(KEY_API_KEYS).unwrap();
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        FileStore::open(temp_dir.path())
            .unwrap()
            .set(KEY_ROOT_DIRECTORY, "/work/project")
            .unwrap();
        let reopened = FileStore::open(temp_dir.path()).unwrap();
        assert_eq!(
            reopened.get(KEY_ROOT_DIRECTORY).unwrap().as_deref(),
            Some("/work/project")
        );
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.set(KEY_CODE_INDEX, "{}").unwrap();
        assert_eq!(store.get(KEY_CODE_INDEX).unwrap().as_deref(), Some("{}"));
        store.remove(KEY_CODE_INDEX).unwrap();
        assert!(store.get(KEY_CODE_INDEX).unwrap().is_none());
    }
}
