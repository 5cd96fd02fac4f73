//! # Persistence Module
//!
//! The watch registry persists two ordered string lists: the watched map names and
//! the server URLs. It talks to storage only through the [`KeyValueStore`] contract,
//! loading once at construction and writing through synchronously on every change.
//!
//! ## Contained Modules:
//! - **`json_file`**: a single JSON document on disk holding every key.
//!
//! [`MemoryStore`] lives here as well; it backs tests and throwaway sessions.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

/// JSON file backed store.
pub mod json_file;

pub use json_file::JsonFileStore;

/// Key under which the watched map names are stored.
pub const MAPS_KEY: &str = "maps";
/// Key under which the server endpoint URLs are stored.
pub const SERVERS_KEY: &str = "servers";

#[derive(Debug, Error)]
/// # Store Error
///
/// Failures reading or writing persisted lists.
pub enum StoreError {
    /// The backing file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but is not a valid store document.
    #[error("JSON error in {path}: {source}")]
    Json {
        /// File that failed to parse or serialize.
        path: PathBuf,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// A key-value store holding ordered string lists.
pub trait KeyValueStore: Send + Sync {
    /// Returns the list stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<String>>, StoreError>;

    /// Replaces the list stored under `key`. Must be durable when it returns.
    fn set(&mut self, key: &str, value: &[String]) -> Result<(), StoreError>;
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with the given maps and servers.
    pub fn seeded(maps: &[&str], servers: &[&str]) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(MAPS_KEY.to_string(), maps.iter().map(|s| s.to_string()).collect());
        entries.insert(SERVERS_KEY.to_string(), servers.iter().map(|s| s.to_string()).collect());
        Self { entries }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<String>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[String]) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
