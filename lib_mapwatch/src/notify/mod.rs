//! # Notification Delivery
//!
//! Once the gate decides a watched map deserves attention, the notification is handed
//! to a [`NotifySink`] after a short delay. Delivery is fire-and-forget: the pass that
//! decided to notify never waits for, or hears back from, the sink.
//!
//! ## Contained Modules:
//! - **`speech`**: speaks notifications aloud through `espeak` or `wsay`.
//!
//! [`LogSink`] and [`FanoutSink`] live here directly.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

/// Text-to-speech sink.
pub mod speech;

pub use speech::{SpeechSink, VoiceOptions};

/// Title used for every watched-map notification.
pub const NOTIFICATION_TITLE: &str = "Favorite map is running";
/// Default delay between the decision to notify and delivery.
pub const DEFAULT_NOTIFY_DELAY: Duration = Duration::from_secs(2);

/// A notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short headline.
    pub title: String,
    /// The map name.
    pub body: String,
}

impl Notification {
    /// The standard "watched map is running" notification for `map`.
    pub fn watched_map(map: &str) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: map.to_string(),
        }
    }
}

/// Accepts notifications for display. Must not block for long.
pub trait NotifySink: Send + Sync {
    /// Shows (or speaks, or records) a notification.
    fn notify(&self, title: &str, body: &str);
}

/// Writes notifications to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotifySink for LogSink {
    fn notify(&self, title: &str, body: &str) {
        info!(target: "mapwatch::notify", title, body, "Notification");
    }
}

/// Delivers every notification to each inner sink, in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotifySink>>,
}

impl FanoutSink {
    /// Creates an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink to the fan-out.
    pub fn with(mut self, sink: Arc<dyn NotifySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of inner sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True when no sink is attached.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotifySink for FanoutSink {
    fn notify(&self, title: &str, body: &str) {
        for sink in &self.sinks {
            sink.notify(title, body);
        }
    }
}

/// Delivers `notification` to `sink` after `delay` on a background task.
pub fn schedule(sink: Arc<dyn NotifySink>, delay: Duration, notification: Notification) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        sink.notify(&notification.title, &notification.body);
    })
}
