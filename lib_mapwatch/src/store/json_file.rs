//! # JSON File Store
//!
//! Keeps every key in one JSON object on disk, e.g.
//! `{"maps": ["haven"], "servers": ["http://..."]}`. The whole document is rewritten
//! on each `set`, through a sibling temp file and a rename so a crash mid-write never
//! leaves a truncated store behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{KeyValueStore, StoreError};

/// # JSON File Store
#[derive(Debug)]
pub struct JsonFileStore {
    /// Location of the JSON document.
    path: PathBuf,
    /// The in-memory copy of the document, loaded at open.
    entries: BTreeMap<String, Vec<String>>,
}

impl JsonFileStore {
    /// Opens the store at `path`.
    ///
    /// A missing file is an empty store; its parent directory is created on the first
    /// write. A present but unparseable file is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&text).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?
        } else {
            info!("Store not found at {}. Starting empty.", path.display());
            BTreeMap::new()
        };

        Ok(Self { path, entries })
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let text = serde_json::to_string_pretty(&self.entries).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!("Store written to {}", self.path.display());
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<String>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[String]) -> Result<(), StoreError> {
        let previous = self.entries.insert(key.to_string(), value.to_vec());
        if let Err(e) = self.flush() {
            // Keep the in-memory document identical to what is on disk.
            match previous {
                Some(old) => self.entries.insert(key.to_string(), old),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}
