//! # Core Engine Module
//!
//! Everything a poll pass needs between the scheduler tick and the notification sink.
//!
//! ## Core Components:
//!
//! - **`aggregator`**: fans out one fetch per registered server, joins on all of them
//!   and picks the busiest server as the winner.
//!
//! - **`gate`**: decides whether the winner's map raises a notification, applying
//!   the watch-list, the cooldown window and the same-map suppression.
//!
//! - **`registry`**: the watched-map and server lists, written through to the
//!   key-value store on every change.
//!
//! - **`watcher`**: the driver. Owns registry, debounce state and sink, runs passes,
//!   discards superseded ones and broadcasts results.
//!
//! - **`scheduler`**: the periodic timer and the "polling enabled" flag.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Concurrent fan-out and winner selection.
pub mod aggregator;
/// Watch-list membership and debounce rules.
pub mod gate;
/// Persisted watched-map and server lists.
pub mod registry;
/// Periodic and on-demand pass triggering.
pub mod scheduler;
/// Pass driver tying the other components together.
pub mod watcher;

// --- Public API Re-exports ---
pub use aggregator::{Aggregator, select_winner};
pub use gate::{DebounceState, NotificationDecision, NotificationGate};
pub use registry::WatchRegistry;
pub use scheduler::{PassRunner, Scheduler};
pub use watcher::{MapWatcher, PassOutcome, WatchEvent, WatcherOptions};
