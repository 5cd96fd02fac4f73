//! # Watch Registry
//!
//! Owns the watched-map list and the server list. Both are loaded once from the
//! key-value store and every mutation writes the changed list straight back.
use tracing::{debug, info, warn};

use crate::snapshot::ServerEndpoint;
use crate::store::{KeyValueStore, StoreError, MAPS_KEY, SERVERS_KEY};

pub struct WatchRegistry {
    store: Box<dyn KeyValueStore>,
    maps: Vec<String>,
    servers: Vec<ServerEndpoint>,
}

impl WatchRegistry {
    /// Loads both lists from `store`. Missing keys start as empty lists.
    pub fn load(store: Box<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let stored_maps = store.get(MAPS_KEY)?.unwrap_or_default();
        let servers: Vec<ServerEndpoint> = store
            .get(SERVERS_KEY)?
            .unwrap_or_default()
            .into_iter()
            .map(ServerEndpoint::from)
            .collect();

        // A hand-edited store may carry duplicates; keep the first occurrence.
        let mut maps: Vec<String> = Vec::with_capacity(stored_maps.len());
        for map in stored_maps {
            if maps.contains(&map) {
                warn!("Dropping duplicate watched map '{}' from store", map);
            } else {
                maps.push(map);
            }
        }

        info!("Registry loaded: {} maps, {} servers", maps.len(), servers.len());
        Ok(Self { store, maps, servers })
    }

    /// Watched map names, in insertion order.
    pub fn maps(&self) -> &[String] {
        &self.maps
    }

    /// Registered servers, in registration order.
    pub fn servers(&self) -> &[ServerEndpoint] {
        &self.servers
    }

    pub fn is_watched(&self, map: &str) -> bool {
        self.maps.iter().any(|m| m == map)
    }

    /// Appends a server and persists the server list.
    pub fn add_server(&mut self, url: impl Into<ServerEndpoint>) -> Result<(), StoreError> {
        let endpoint = url.into();
        debug!(server = %endpoint, "Adding server");
        let mut servers = self.servers.clone();
        servers.push(endpoint);
        self.commit_servers(servers)
    }

    /// Removes the server at `index` and persists the server list.
    ///
    /// # Panics
    /// When `index` is out of range. Callers validate indices from user input first.
    pub fn remove_server(&mut self, index: usize) -> Result<ServerEndpoint, StoreError> {
        assert!(
            index < self.servers.len(),
            "remove_server: index {} out of range for {} servers",
            index,
            self.servers.len()
        );
        let mut servers = self.servers.clone();
        let removed = servers.remove(index);
        self.commit_servers(servers)?;
        debug!(server = %removed, "Removed server");
        Ok(removed)
    }

    /// Adds `name` to the watch-list unless it is already there.
    ///
    /// Returns `true` when the list changed. Nothing is written for a no-op.
    pub fn add_map(&mut self, name: &str) -> Result<bool, StoreError> {
        if self.is_watched(name) {
            return Ok(false);
        }
        let mut maps = self.maps.clone();
        maps.push(name.to_string());
        self.commit_maps(maps)?;
        Ok(true)
    }

    /// Removes the watched map at `index` and persists the watch-list.
    ///
    /// # Panics
    /// When `index` is out of range.
    pub fn remove_map(&mut self, index: usize) -> Result<String, StoreError> {
        assert!(
            index < self.maps.len(),
            "remove_map: index {} out of range for {} maps",
            index,
            self.maps.len()
        );
        let mut maps = self.maps.clone();
        let removed = maps.remove(index);
        self.commit_maps(maps)?;
        Ok(removed)
    }

    // The in-memory lists only change once the store has accepted the new list,
    // so a failed write leaves memory and storage in agreement.
    fn commit_maps(&mut self, maps: Vec<String>) -> Result<(), StoreError> {
        self.store.set(MAPS_KEY, &maps)?;
        self.maps = maps;
        Ok(())
    }

    fn commit_servers(&mut self, servers: Vec<ServerEndpoint>) -> Result<(), StoreError> {
        let urls: Vec<String> = servers.iter().map(|s| s.url().to_string()).collect();
        self.store.set(SERVERS_KEY, &urls)?;
        self.servers = servers;
        Ok(())
    }
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("maps", &self.maps)
            .field("servers", &self.servers)
            .finish_non_exhaustive()
    }
}
