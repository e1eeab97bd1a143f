//! Tracks whether the extension's page handler is reachable.

use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::page::PageChannel;

pub const DISCONNECT_AFTER: Duration = Duration::from_secs(5);
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Flips to disconnected when no confirming signal arrives within the window
/// and a ping goes unanswered. Probes with `ping` while disconnected.
pub struct ConnectionMonitor {
    state: watch::Sender<bool>,
    last_seen: Mutex<Option<Instant>>,
    window: Duration,
    probe_interval: Duration,
}

impl ConnectionMonitor {
    pub fn new(window: Duration, probe_interval: Duration) -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state,
            last_seen: Mutex::new(None),
            window,
            probe_interval,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Records a sign of life from the extension.
    pub fn confirm(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Some(Instant::now());
        }
        if self.set(true) {
            tracing::info!("extension connected");
        }
    }

    pub fn mark_disconnected(&self) {
        if self.set(false) {
            tracing::warn!("extension disconnected");
        }
    }

    /// Subscribers are only woken by an actual flip.
    fn set(&self, connected: bool) -> bool {
        self.state.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        })
    }

    fn expired(&self) -> bool {
        match self.last_seen.lock() {
            Ok(last_seen) => last_seen.is_none_or(|t| t.elapsed() > self.window),
            Err(_) => true,
        }
    }

    /// One watchdog step. A quiet window is checked with a ping before the
    /// connection is given up; a dead connection is probed every step.
    pub async fn tick(&self, page: &dyn PageChannel) {
        if self.is_connected() && !self.expired() {
            return;
        }
        if page.ping().await {
            self.confirm();
        } else {
            self.mark_disconnected();
        }
    }

    pub async fn run(&self, page: &dyn PageChannel) {
        let mut interval = tokio::time::interval(self.probe_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.tick(page).await;
        }
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new(DISCONNECT_AFTER, PROBE_INTERVAL)
    }
}
