//! # Map Watcher
//!
//! The driver that owns the registry, the debounce state and the notification sink,
//! and runs complete passes: poll every server, pick a winner, report it, and let the
//! gate decide whether to notify.
//!
//! Passes may overlap (a manual refresh while a timed pass is still waiting on a slow
//! server). Each pass takes a generation number when it starts; once its join
//! completes, it only proceeds if no newer pass has started in the meantime. A stale
//! pass drops its winner without touching the debounce state or emitting events.
//!
//! Results reach the presentation layer through a broadcast channel of
//! [`WatchEvent`]s obtained from [`MapWatcher::subscribe`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info};

use super::aggregator::Aggregator;
use super::gate::{DEFAULT_COOLDOWN_SECS, DebounceState, NotificationDecision, NotificationGate};
use super::registry::WatchRegistry;
use crate::notify::{self, DEFAULT_NOTIFY_DELAY, NotifySink};
use crate::retrieve::Fetcher;
use crate::snapshot::{ServerEndpoint, ServerSnapshot};
use crate::store::StoreError;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Tunables for a [`MapWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherOptions {
    /// Minimum interval between two notifications.
    pub cooldown: TimeDelta,
    /// Delay between a notify decision and delivery to the sink.
    pub notify_delay: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            cooldown: TimeDelta::seconds(DEFAULT_COOLDOWN_SECS),
            notify_delay: DEFAULT_NOTIFY_DELAY,
        }
    }
}

/// Something the presentation layer may want to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A pass completed with a winner.
    Refreshed(ServerSnapshot),
    /// The winner is running a watched map and a notification was scheduled.
    WatchedMapActive {
        /// The watched map now running.
        map: String,
    },
}

/// How a single pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every fetch failed, or no server is registered.
    NoWinner,
    /// A newer pass started while this one was joining; its result was dropped.
    Superseded,
    /// The winner was reported and evaluated.
    Completed {
        winner: ServerSnapshot,
        decision: NotificationDecision,
    },
}

/// # Map Watcher
pub struct MapWatcher<F> {
    registry: RwLock<WatchRegistry>,
    aggregator: Aggregator<F>,
    gate: NotificationGate,
    debounce: Mutex<DebounceState>,
    generation: AtomicU64,
    sink: Arc<dyn NotifySink>,
    notify_delay: Duration,
    events: broadcast::Sender<WatchEvent>,
}

impl<F: Fetcher> MapWatcher<F> {
    pub fn new(registry: WatchRegistry, fetcher: F, sink: Arc<dyn NotifySink>, options: WatcherOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry: RwLock::new(registry),
            aggregator: Aggregator::new(fetcher),
            gate: NotificationGate::new(options.cooldown),
            debounce: Mutex::new(DebounceState::default()),
            generation: AtomicU64::new(0),
            sink,
            notify_delay: options.notify_delay,
            events,
        }
    }

    /// A new receiver for pass results. Slow receivers lose the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Runs one pass, evaluating the gate at the wall-clock time the join completes.
    pub async fn run_pass(&self) -> PassOutcome {
        self.pass(None).await
    }

    /// Runs one pass, evaluating the gate as if it were `now`.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> PassOutcome {
        self.pass(Some(now)).await
    }

    async fn pass(&self, now: Option<DateTime<Utc>>) -> PassOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // Removals made while this pass is in flight only affect later passes.
        let servers = self.registry.read().await.servers().to_vec();
        debug!(generation, servers = servers.len(), "Pass started");

        let Some(winner) = self.aggregator.poll(&servers).await else {
            debug!(generation, "Pass produced no winner");
            return PassOutcome::NoWinner;
        };

        let mut debounce = self.debounce.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Pass superseded; dropping winner {}", winner.server);
            return PassOutcome::Superseded;
        }

        let _ = self.events.send(WatchEvent::Refreshed(winner.clone()));

        let decision = {
            let registry = self.registry.read().await;
            let now = now.unwrap_or_else(Utc::now);
            self.gate.evaluate(&winner, registry.maps(), &mut debounce, now)
        };
        drop(debounce);

        if let NotificationDecision::Notify(notification) = &decision {
            info!("Notifying about {} in {:?}", notification.body, self.notify_delay);
            notify::schedule(Arc::clone(&self.sink), self.notify_delay, notification.clone());
            let _ = self.events.send(WatchEvent::WatchedMapActive {
                map: winner.active_map.clone(),
            });
        }

        PassOutcome::Completed { winner, decision }
    }

    /// Copy of the current debounce state.
    pub async fn debounce(&self) -> DebounceState {
        self.debounce.lock().await.clone()
    }

    pub async fn maps(&self) -> Vec<String> {
        self.registry.read().await.maps().to_vec()
    }

    pub async fn servers(&self) -> Vec<ServerEndpoint> {
        self.registry.read().await.servers().to_vec()
    }

    /// Registers a server. The caller decides whether to refresh right away.
    pub async fn add_server(&self, url: impl Into<ServerEndpoint>) -> Result<(), StoreError> {
        self.registry.write().await.add_server(url)
    }

    /// Removes the server at `index`. Panics on an out-of-range index.
    pub async fn remove_server(&self, index: usize) -> Result<ServerEndpoint, StoreError> {
        self.registry.write().await.remove_server(index)
    }

    /// Watches `name`. Returns `false` if it was already watched.
    pub async fn add_map(&self, name: &str) -> Result<bool, StoreError> {
        self.registry.write().await.add_map(name)
    }

    /// Stops watching the map at `index`. Panics on an out-of-range index.
    pub async fn remove_map(&self, index: usize) -> Result<String, StoreError> {
        self.registry.write().await.remove_map(index)
    }
}
