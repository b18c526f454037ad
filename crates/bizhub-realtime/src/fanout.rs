//! Persist-then-publish notification fan-out.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use bizhub_core::config::BrokerConfig;
use bizhub_core::result::AppResult;
use bizhub_core::traits::{Clock, MessageBroker};
use bizhub_database::store::{DeviceStore, NotificationStore};
use bizhub_entity::ModuleType;
use bizhub_entity::notification::{NewNotification, Notification};

use crate::channel::ChannelType;
use crate::message::{NotificationEvent, WireMessage};

/// Where a persisted notification was sent live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Published on the channel.
    Published(ChannelType),
    /// Target device is not reachable; catch-up will deliver it.
    Deferred,
    /// Publishing kept failing; the row is persisted regardless.
    Failed(ChannelType),
}

/// Writes notifications to the store and publishes them to subscribers.
///
/// The row is always committed before anything is published, and a publish
/// failure never removes it.
pub struct Fanout {
    store: Arc<dyn NotificationStore>,
    devices: Arc<dyn DeviceStore>,
    broker: Arc<dyn MessageBroker>,
    clock: Arc<dyn Clock>,
    attempts: u32,
    backoff: Duration,
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout")
            .field("broker", &self.broker.provider_name())
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl Fanout {
    /// Create a fan-out over the given collaborators.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        devices: Arc<dyn DeviceStore>,
        broker: Arc<dyn MessageBroker>,
        clock: Arc<dyn Clock>,
        config: &BrokerConfig,
    ) -> Self {
        Self {
            store,
            devices,
            broker,
            clock,
            attempts: config.publish_attempts.max(1),
            backoff: Duration::from_millis(config.publish_backoff_ms),
        }
    }

    /// The notification store behind this fan-out.
    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    /// Persist a notification and publish it.
    pub async fn publish(&self, input: NewNotification) -> AppResult<Notification> {
        let (notification, _) = self.publish_with_delivery(input).await?;
        Ok(notification)
    }

    /// Persist a notification, publish it, and report what happened live.
    pub async fn publish_with_delivery(
        &self,
        input: NewNotification,
    ) -> AppResult<(Notification, Delivery)> {
        let notification = Notification::new(input, self.clock.now());
        let notification = self.store.insert(&notification).await?;

        let Some(channel) = self.route(&notification).await? else {
            debug!(
                notification_id = %notification.id,
                target_device = ?notification.target_device_id,
                "Target device offline, deferring to catch-up"
            );
            return Ok((notification, Delivery::Deferred));
        };

        let payload = WireMessage::Notification(NotificationEvent::from(&notification)).encode()?;
        let delivery = match self.publish_with_retry(&channel, &payload).await {
            Ok(()) => {
                info!(
                    notification_id = %notification.id,
                    action = %notification.action,
                    channel = %channel,
                    "Notification published"
                );
                Delivery::Published(channel)
            }
            Err(e) => {
                warn!(
                    notification_id = %notification.id,
                    channel = %channel,
                    error = %e,
                    "Notification persisted but not published"
                );
                Delivery::Failed(channel)
            }
        };
        Ok((notification, delivery))
    }

    /// Tell subscribers that notifications about an entity are settled.
    /// Failures are logged only.
    pub async fn publish_resolution(
        &self,
        target: Option<ModuleType>,
        entity_type: &str,
        entity_id: &str,
    ) {
        let message = WireMessage::Resolved {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            timestamp: self.clock.now(),
        };
        let channel = ChannelType::for_target(target);
        let result = match message.encode() {
            Ok(payload) => self.publish_with_retry(&channel, &payload).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(entity_type, entity_id, error = %e, "Failed to publish resolution");
        }
    }

    /// Pick the live channel, or `None` when the target device is offline.
    async fn route(&self, notification: &Notification) -> AppResult<Option<ChannelType>> {
        match &notification.target_device_id {
            Some(device_id) => Ok(self
                .devices
                .find(device_id)
                .await?
                .filter(|d| d.is_reachable())
                .map(|d| ChannelType::Module(d.module_type))),
            None => Ok(Some(ChannelType::for_target(notification.target_module))),
        }
    }

    async fn publish_with_retry(&self, channel: &ChannelType, payload: &str) -> AppResult<()> {
        let name = channel.to_channel_string();
        let mut delay = self.backoff;
        let mut attempt = 1;
        loop {
            match self.broker.publish(&name, payload).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.attempts => {
                    debug!(channel = %name, attempt, error = %e, "Publish failed, backing off");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
