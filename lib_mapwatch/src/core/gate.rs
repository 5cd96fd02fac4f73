//! # Notification Gate
//!
//! Decides whether the winner of a pass should raise a notification. A map only
//! qualifies when it is on the watch-list, and even then it is suppressed while
//! either of two conditions holds:
//!
//! 1. the previous notification fired less than the cooldown ago (900 s by default);
//! 2. the map is the same one that was last notified.
//!
//! Both rules apply independently. In practice this means a watched map that stays
//! up, or comes back later, does not notify again until some other watched map has
//! fired in between.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::notify::Notification;
use crate::snapshot::ServerSnapshot;

/// Default minimum interval between two notifications, in seconds.
pub const DEFAULT_COOLDOWN_SECS: i64 = 900;

/// # Debounce State
///
/// When and for which map the last notification fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceState {
    /// Time of the last notification. Starts at the Unix epoch.
    pub last_notified_at: DateTime<Utc>,
    /// Map of the last notification. Starts empty.
    pub last_notified_map: String,
}

impl Default for DebounceState {
    fn default() -> Self {
        Self {
            last_notified_at: DateTime::<Utc>::default(),
            last_notified_map: String::new(),
        }
    }
}

/// Outcome of evaluating one winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationDecision {
    /// Deliver this notification; the debounce state has already been updated.
    Notify(Notification),
    /// Nothing to do.
    NoAction,
}

impl NotificationDecision {
    /// True for [`NotificationDecision::Notify`].
    pub fn is_notify(&self) -> bool {
        matches!(self, Self::Notify(_))
    }
}

/// Applies the watch-list membership and debounce rules.
#[derive(Debug, Clone, Copy)]
pub struct NotificationGate {
    cooldown: TimeDelta,
}

impl Default for NotificationGate {
    fn default() -> Self {
        Self::new(TimeDelta::seconds(DEFAULT_COOLDOWN_SECS))
    }
}

impl NotificationGate {
    /// Creates a gate with a custom cooldown.
    pub fn new(cooldown: TimeDelta) -> Self {
        Self { cooldown }
    }

    /// The configured cooldown.
    pub fn cooldown(&self) -> TimeDelta {
        self.cooldown
    }

    /// Evaluates `winner` at time `now`.
    ///
    /// On [`NotificationDecision::Notify`] the debounce state is moved to
    /// (`now`, winner's map) before returning.
    pub fn evaluate(
        &self,
        winner: &ServerSnapshot,
        watch_list: &[String],
        debounce: &mut DebounceState,
        now: DateTime<Utc>,
    ) -> NotificationDecision {
        let map = winner.active_map.as_str();
        if !watch_list.iter().any(|watched| watched == map) {
            return NotificationDecision::NoAction;
        }

        let within_cooldown = now - debounce.last_notified_at < self.cooldown;
        let same_map = debounce.last_notified_map == map;
        if within_cooldown || same_map {
            debug!(map, within_cooldown, same_map, "Watched map suppressed");
            return NotificationDecision::NoAction;
        }

        info!(map, server = %winner.server, "Watched map is active");
        debounce.last_notified_at = now;
        debounce.last_notified_map = map.to_string();
        NotificationDecision::Notify(Notification::watched_map(map))
    }
}
