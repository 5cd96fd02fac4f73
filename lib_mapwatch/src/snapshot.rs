//! # Server Snapshot Model
//!
//! The two value types that flow through a poll pass: the endpoint being polled and
//! the state scraped from it. Snapshots are rebuilt on every successful fetch and are
//! never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A registered game-server status page, identified by its URL.
///
/// The URL is fixed once the endpoint is created; to change it, remove the endpoint
/// and add a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerEndpoint {
    url: String,
}

impl ServerEndpoint {
    /// Wraps a status page URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The status page URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl From<&str> for ServerEndpoint {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for ServerEndpoint {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// # Server Snapshot
///
/// What one server was running at the moment it was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    /// The endpoint this snapshot was scraped from.
    pub server: ServerEndpoint,
    /// The map reported as currently active. Empty when the page did not say.
    pub active_map: String,
    /// Number of connected players. Zero when the page reported something unparseable.
    pub player_count: u32,
    /// Preview image for the active map, if the page carried one.
    pub image_ref: Option<String>,
}
