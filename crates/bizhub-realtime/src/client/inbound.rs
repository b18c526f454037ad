//! Receive-side filtering and de-duplication.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use bizhub_core::types::NotificationId;

use super::dismiss::AutoDismissScheduler;
use super::event::{ClientEvent, Origin};
use crate::message::{NotificationEvent, WireMessage};

/// What happened to an inbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forwarded to the inbox.
    Delivered,
    /// Sent by this device with `exclude_sender` set.
    OwnMessage,
    /// Addressed to a different device.
    OtherDevice,
    /// Already delivered once.
    Duplicate,
    /// Inbox is gone.
    Closed,
}

/// Filters everything addressed to one device before it reaches the inbox.
///
/// Live and replayed messages take the same path, so a notification seen
/// on both is delivered once.
pub struct InboundRouter {
    device_id: String,
    seen: Cache<NotificationId, ()>,
    inbox: mpsc::Sender<ClientEvent>,
    dismiss: AutoDismissScheduler,
    latest: Mutex<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for InboundRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundRouter")
            .field("device_id", &self.device_id)
            .field("seen", &self.seen.entry_count())
            .finish()
    }
}

impl InboundRouter {
    /// Create a router remembering up to `dedup_capacity` ids.
    pub fn new(
        device_id: impl Into<String>,
        dedup_capacity: usize,
        inbox: mpsc::Sender<ClientEvent>,
        dismiss: AutoDismissScheduler,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            seen: Cache::new(dedup_capacity.max(1) as u64),
            inbox,
            dismiss,
            latest: Mutex::new(None),
        }
    }

    /// The device this router filters for.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Newest creation time among delivered notifications.
    pub fn latest_delivered(&self) -> Option<DateTime<Utc>> {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decode and route a raw broker payload. Malformed payloads are dropped.
    pub async fn handle_payload(&self, payload: &str) -> Option<Verdict> {
        match WireMessage::decode(payload) {
            Ok(message) => self.handle(message, Origin::Live).await,
            Err(e) => {
                warn!(device_id = %self.device_id, error = %e, "Dropping malformed message");
                None
            }
        }
    }

    /// Route a decoded message. Returns a verdict for notifications only.
    pub async fn handle(&self, message: WireMessage, origin: Origin) -> Option<Verdict> {
        match message {
            WireMessage::Notification(event) => Some(self.handle_notification(event, origin).await),
            WireMessage::Resolved {
                entity_type,
                entity_id,
                timestamp,
            } => {
                let _ = self
                    .inbox
                    .send(ClientEvent::Resolved {
                        entity_type,
                        entity_id,
                        at: timestamp,
                    })
                    .await;
                None
            }
        }
    }

    async fn handle_notification(&self, event: NotificationEvent, origin: Origin) -> Verdict {
        let verdict = self.filter(&event);
        if verdict != Verdict::Delivered {
            debug!(
                device_id = %self.device_id,
                notification_id = %event.id,
                ?verdict,
                ?origin,
                "Notification filtered"
            );
            return verdict;
        }

        let id = event.id;
        let priority = event.priority;
        let created_at = event.timestamp;
        if self
            .inbox
            .send(ClientEvent::Notification { event, origin })
            .await
            .is_err()
        {
            return Verdict::Closed;
        }

        self.dismiss.schedule(id, priority);
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        if latest.is_none_or(|t| t < created_at) {
            *latest = Some(created_at);
        }
        Verdict::Delivered
    }

    fn filter(&self, event: &NotificationEvent) -> Verdict {
        if event.exclude_sender && event.source_device_id.as_deref() == Some(self.device_id.as_str())
        {
            return Verdict::OwnMessage;
        }
        if event
            .target_device_id
            .as_deref()
            .is_some_and(|target| target != self.device_id)
        {
            return Verdict::OtherDevice;
        }
        if !self.seen.entry(event.id).or_insert(()).is_fresh() {
            return Verdict::Duplicate;
        }
        Verdict::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bizhub_entity::ModuleType;
    use bizhub_entity::notification::{NewNotification, Notification};

    fn router() -> (InboundRouter, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let dismiss = AutoDismissScheduler::new(Duration::ZERO, tx.clone());
        (InboundRouter::new("dev-1", 100, tx, dismiss), rx)
    }

    fn event(input: NewNotification) -> NotificationEvent {
        NotificationEvent::from(&Notification::new(
            NewNotification {
                notification_type: "STOCK".to_string(),
                title: "Stock changed".to_string(),
                target_module: Some(ModuleType::Sales),
                ..input
            },
            Utc::now(),
        ))
    }

    #[tokio::test]
    async fn test_own_message_with_exclude_sender_is_dropped() {
        let (router, _rx) = router();
        let own = event(NewNotification {
            source_device_id: Some("dev-1".to_string()),
            exclude_sender: true,
            ..Default::default()
        });
        let echoed = event(NewNotification {
            source_device_id: Some("dev-1".to_string()),
            ..Default::default()
        });

        assert_eq!(
            router.handle(WireMessage::Notification(own), Origin::Live).await,
            Some(Verdict::OwnMessage)
        );
        assert_eq!(
            router.handle(WireMessage::Notification(echoed), Origin::Live).await,
            Some(Verdict::Delivered)
        );
    }

    #[tokio::test]
    async fn test_other_device_target_is_dropped() {
        let (router, _rx) = router();
        let elsewhere = event(NewNotification {
            target_device_id: Some("dev-2".to_string()),
            ..Default::default()
        });
        assert_eq!(
            router.handle(WireMessage::Notification(elsewhere), Origin::Live).await,
            Some(Verdict::OtherDevice)
        );
    }

    #[tokio::test]
    async fn test_live_then_replay_delivers_once() {
        let (router, mut rx) = router();
        let e = event(NewNotification::default());
        let payload = WireMessage::Notification(e.clone()).encode().unwrap();

        assert_eq!(router.handle_payload(&payload).await, Some(Verdict::Delivered));
        assert_eq!(
            router.handle(WireMessage::Notification(e.clone()), Origin::Replay).await,
            Some(Verdict::Duplicate)
        );

        match rx.recv().await {
            Some(ClientEvent::Notification { event, origin }) => {
                assert_eq!(event.id, e.id);
                assert_eq!(origin, Origin::Live);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(router.latest_delivered(), Some(e.timestamp));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_ignored() {
        let (router, mut rx) = router();
        assert_eq!(router.handle_payload("not json").await, None);
        assert!(rx.try_recv().is_err());
    }
}
