//! # Poll Scheduler
//!
//! Fires a pass every `period` while polling is enabled, and on demand. The enabled
//! flag is a `watch` channel so a UI can observe it. A scheduler owns at most one
//! live timer: arming again cancels the previous timer task through its
//! `CancellationToken` before the new one starts.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::watcher::MapWatcher;
use crate::retrieve::Fetcher;

/// Default time between two scheduled passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(150);
/// Shortest period a scheduler accepts; shorter ones are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Something that can run one pass.
pub trait PassRunner: Send + Sync + 'static {
    fn run(&self) -> impl Future<Output = ()> + Send;
}

impl<F: Fetcher + 'static> PassRunner for MapWatcher<F> {
    async fn run(&self) {
        self.run_pass().await;
    }
}

pub struct Scheduler<R> {
    runner: Arc<R>,
    period: Duration,
    enabled: watch::Sender<bool>,
    timer: Mutex<Option<CancellationToken>>,
}

impl<R: PassRunner> Scheduler<R> {
    /// Creates a disarmed scheduler with polling enabled.
    ///
    /// A `period` below [`MIN_POLL_INTERVAL`] (including zero) is raised to it.
    pub fn new(runner: Arc<R>, period: Duration) -> Self {
        let period = if period < MIN_POLL_INTERVAL {
            warn!("Poll interval {:?} too short, using {:?}", period, MIN_POLL_INTERVAL);
            MIN_POLL_INTERVAL
        } else {
            period
        };
        let (enabled, _) = watch::channel(true);
        Self {
            runner,
            period,
            enabled,
            timer: Mutex::new(None),
        }
    }

    pub fn runner(&self) -> &Arc<R> {
        &self.runner
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Observes changes to the enabled flag.
    pub fn subscribe_enabled(&self) -> watch::Receiver<bool> {
        self.enabled.subscribe()
    }

    /// Turns polling on or off.
    ///
    /// Switching from off to on runs a pass straight away and returns its handle.
    /// Ticks that land while disabled are skipped.
    pub fn set_enabled(&self, on: bool) -> Option<JoinHandle<()>> {
        let was = self.enabled.send_replace(on);
        info!("Polling {}", if on { "enabled" } else { "disabled" });
        if on && !was { Some(self.trigger_now()) } else { None }
    }

    /// Runs a pass now, whether or not polling is enabled.
    pub fn trigger_now(&self) -> JoinHandle<()> {
        let runner = Arc::clone(&self.runner);
        tokio::spawn(async move { runner.run().await })
    }

    /// Starts the periodic timer, replacing any running one. The first tick is one
    /// period from now.
    pub fn arm(&self) {
        let token = CancellationToken::new();
        let previous = self
            .timer
            .lock()
            .expect("Scheduler timer lock poisoned")
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let runner = Arc::clone(&self.runner);
        let enabled = self.enabled.subscribe();
        let period = self.period;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Poll timer cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        if *enabled.borrow() {
                            let runner = Arc::clone(&runner);
                            tokio::spawn(async move { runner.run().await });
                        } else {
                            debug!("Polling disabled, tick skipped");
                        }
                    }
                }
            }
        });
    }

    /// Stops the periodic timer. Passes already running finish normally.
    pub fn disarm(&self) {
        if let Some(token) = self.timer.lock().expect("Scheduler timer lock poisoned").take() {
            token.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.lock().expect("Scheduler timer lock poisoned").is_some()
    }
}

impl<R> Drop for Scheduler<R> {
    fn drop(&mut self) {
        let timer = self.timer.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(token) = timer.take() {
            token.cancel();
        }
    }
}
