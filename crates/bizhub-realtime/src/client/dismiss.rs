//! Timed dismissal of shown notifications.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use bizhub_core::types::NotificationId;
use bizhub_entity::notification::NotificationPriority;

use super::event::ClientEvent;

/// One cancellable timer per shown notification.
///
/// High and urgent notifications stay until the user acts on them and are
/// never scheduled.
#[derive(Debug, Clone)]
pub struct AutoDismissScheduler {
    delay: Duration,
    timers: Arc<DashMap<NotificationId, CancellationToken>>,
    root: CancellationToken,
    events: mpsc::Sender<ClientEvent>,
}

impl AutoDismissScheduler {
    /// Create a scheduler. A zero delay disables dismissal.
    pub fn new(delay: Duration, events: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            delay,
            timers: Arc::new(DashMap::new()),
            root: CancellationToken::new(),
            events,
        }
    }

    /// Start the timer for a notification, replacing any running one.
    /// Returns false when the notification is not auto-dismissed.
    pub fn schedule(&self, id: NotificationId, priority: NotificationPriority) -> bool {
        if self.delay.is_zero() || priority.is_sticky() || self.root.is_cancelled() {
            return false;
        }

        let token = self.root.child_token();
        if let Some(previous) = self.timers.insert(id, token.clone()) {
            previous.cancel();
        }

        let timers = self.timers.clone();
        let events = self.events.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    timers.remove_if(&id, |_, current| !current.is_cancelled());
                    if events.send(ClientEvent::Dismissed(id)).await.is_err() {
                        debug!(notification_id = %id, "Inbox closed before dismissal");
                    }
                }
            }
        });
        true
    }

    /// Stop the timer for a notification. Returns false if none was running.
    pub fn cancel(&self, id: NotificationId) -> bool {
        match self.timers.remove(&id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of running timers.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Stop every timer and refuse new ones.
    pub fn shutdown(&self) {
        self.root.cancel();
        self.timers.clear();
    }
}
