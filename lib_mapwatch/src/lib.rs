//! # lib_mapwatch
//!
//! The polling engine behind `server_mapwatch`. It fans out one status request per
//! registered game server, joins the outcomes, picks the server with the most players
//! and decides whether the map running there deserves a notification.
//!
//! Modules are laid out leaves first:
//! - `snapshot`: endpoint and snapshot types shared by every other module.
//! - `extract`: turns a raw status page into map / player / image fields.
//! - `retrieve`: performs one fetch per endpoint (HTTP behind the `retrieve` feature).
//! - `store`: the key-value persistence contract and its file / memory backends.
//! - `notify`: notification sinks and delayed delivery.
//! - `core`: aggregator, notification gate, watch registry, scheduler and the
//!   `MapWatcher` driver that ties them together.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod core;
pub mod extract;
pub mod notify;
pub mod retrieve;
pub mod snapshot;
pub mod store;

// Re-export the types most callers need.
pub use crate::core::{
    Aggregator, DebounceState, MapWatcher, NotificationDecision, NotificationGate, PassOutcome,
    PassRunner, Scheduler, WatchEvent, WatchRegistry, WatcherOptions,
};
pub use notify::{Notification, NotifySink};
pub use retrieve::{FetchError, Fetcher};
pub use snapshot::{ServerEndpoint, ServerSnapshot};
pub use store::{KeyValueStore, StoreError};
