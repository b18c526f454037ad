//! Catch-up for reconnecting clients.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use bizhub_core::error::AppError;
use bizhub_core::result::AppResult;
use bizhub_database::store::{DeviceStore, NotificationStore};
use bizhub_entity::ModuleType;
use bizhub_entity::notification::{Notification, NotificationAction};

use crate::client::CatchUpSource;
use crate::message::NotificationEvent;

/// Finds what a client missed while it was away.
#[derive(Clone)]
pub struct CatchUpReconciler {
    notifications: Arc<dyn NotificationStore>,
    devices: Arc<dyn DeviceStore>,
}

impl std::fmt::Debug for CatchUpReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatchUpReconciler").finish_non_exhaustive()
    }
}

impl CatchUpReconciler {
    /// Create a reconciler over the notification and device stores.
    pub fn new(notifications: Arc<dyn NotificationStore>, devices: Arc<dyn DeviceStore>) -> Self {
        Self {
            notifications,
            devices,
        }
    }

    /// Notifications for a device and its module created after `since`
    /// that `reader` has not read, plus every unresolved approval prompt for
    /// the module. Prompts that were already decided are never replayed.
    ///
    /// `reader` defaults to the device's owner; with no reader at all no
    /// receipt filter applies. `module` defaults to the device's module and
    /// `since` to the device's last-seen time, falling back to its last
    /// heartbeat. Without any anchor all unread rows for the module are
    /// returned. The result has no duplicate ids and is ordered by creation
    /// time.
    pub async fn missed_since(
        &self,
        reader: Option<&str>,
        device_id: Option<&str>,
        module: Option<ModuleType>,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Notification>> {
        let device = match device_id {
            Some(id) => self.devices.find(id).await?,
            None => None,
        };

        let module = module
            .or_else(|| device.as_ref().map(|d| d.module_type))
            .ok_or_else(|| {
                AppError::validation("Catch-up needs a module or a registered device")
            })?;
        let since = since.or_else(|| device.as_ref().map(|d| d.catch_up_anchor()));
        let reader = reader.or_else(|| device.as_ref().map(|d| d.username.as_str()));

        let mut batches = Vec::with_capacity(3);
        if let Some(id) = device_id {
            let for_device = self.notifications.unread_for_device(id, reader).await?;
            batches.push(match since {
                Some(t) => for_device.into_iter().filter(|n| n.created_at > t).collect(),
                None => for_device,
            });
        }
        batches.push(match since {
            Some(t) => {
                self.notifications
                    .unread_for_module_since(module, t, reader)
                    .await?
            }
            None => self.notifications.unread_for_module(module, reader).await?,
        });
        batches.push(
            self.notifications
                .unresolved_by_action(NotificationAction::ApprovalRequested, Some(module))
                .await?,
        );

        let merged = merge(batches);
        debug!(
            reader = ?reader,
            device_id = ?device_id,
            module = %module,
            since = ?since,
            count = merged.len(),
            "Catch-up computed"
        );
        Ok(merged)
    }
}

fn merge(batches: Vec<Vec<Notification>>) -> Vec<Notification> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Notification> = batches
        .into_iter()
        .flatten()
        .filter(|n| !(n.action == NotificationAction::ApprovalRequested && n.resolved))
        .filter(|n| seen.insert(n.id))
        .collect();
    merged.sort_by_key(|n| n.created_at);
    merged
}

#[async_trait]
impl CatchUpSource for CatchUpReconciler {
    async fn missed(
        &self,
        device_id: &str,
        module: ModuleType,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<NotificationEvent>> {
        let missed = self
            .missed_since(None, Some(device_id), Some(module), since)
            .await?;
        Ok(missed.iter().map(NotificationEvent::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizhub_database::memory::{MemoryDeviceStore, MemoryNotificationStore};
    use bizhub_database::store::DeviceUpsert;
    use bizhub_entity::notification::NewNotification;
    use chrono::Duration;

    struct Fixture {
        reconciler: CatchUpReconciler,
        notifications: Arc<MemoryNotificationStore>,
        devices: Arc<MemoryDeviceStore>,
    }

    fn fixture() -> Fixture {
        let notifications = Arc::new(MemoryNotificationStore::new());
        let devices = Arc::new(MemoryDeviceStore::new());
        Fixture {
            reconciler: CatchUpReconciler::new(notifications.clone(), devices.clone()),
            notifications,
            devices,
        }
    }

    async fn add(
        store: &MemoryNotificationStore,
        input: NewNotification,
        at: DateTime<Utc>,
    ) -> Notification {
        store.insert(&Notification::new(input, at)).await.unwrap()
    }

    fn to_module(module: Option<ModuleType>) -> NewNotification {
        NewNotification {
            notification_type: "STOCK".to_string(),
            title: "Stock changed".to_string(),
            target_module: module,
            created_by: "bob".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_since_is_exclusive_and_includes_broadcast() {
        let f = fixture();
        let t = Utc::now();
        add(&f.notifications, to_module(Some(ModuleType::Sales)), t).await;
        let sales = add(
            &f.notifications,
            to_module(Some(ModuleType::Sales)),
            t + Duration::seconds(1),
        )
        .await;
        let all = add(&f.notifications, to_module(None), t + Duration::seconds(2)).await;
        add(
            &f.notifications,
            to_module(Some(ModuleType::Pricing)),
            t + Duration::seconds(3),
        )
        .await;

        let ids: Vec<_> = f
            .reconciler
            .missed_since(None, None, Some(ModuleType::Sales), Some(t))
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();

        assert_eq!(ids, vec![sales.id, all.id]);
    }

    #[tokio::test]
    async fn test_device_defaults_and_open_prompts() {
        let f = fixture();
        let t = Utc::now();
        f.devices
            .upsert(
                &DeviceUpsert {
                    device_id: "dev-1".to_string(),
                    username: "alice".to_string(),
                    user_id: None,
                    module_type: ModuleType::Sales,
                },
                t,
            )
            .await
            .unwrap();
        f.devices.deactivate("dev-1", t).await.unwrap();

        let prompt = add(
            &f.notifications,
            NewNotification {
                action: Some(NotificationAction::ApprovalRequested),
                requires_resolution: true,
                ..to_module(Some(ModuleType::Sales))
            },
            t - Duration::days(1),
        )
        .await;
        let direct = add(
            &f.notifications,
            NewNotification {
                target_device_id: Some("dev-1".to_string()),
                ..to_module(None)
            },
            t + Duration::minutes(5),
        )
        .await;
        let module = add(
            &f.notifications,
            to_module(Some(ModuleType::Sales)),
            t + Duration::minutes(6),
        )
        .await;

        let missed = f.reconciler.missed_since(None, Some("dev-1"), None, None).await.unwrap();
        let ids: Vec<_> = missed.iter().map(|n| n.id).collect();

        assert_eq!(ids, vec![prompt.id, direct.id, module.id]);
    }

    #[tokio::test]
    async fn test_unknown_device_without_module_is_rejected() {
        let f = fixture();
        assert!(f.reconciler.missed_since(None, Some("ghost"), None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_decided_prompt_is_not_replayed() {
        let f = fixture();
        let t = Utc::now();
        add(
            &f.notifications,
            NewNotification {
                action: Some(NotificationAction::ApprovalRequested),
                requires_resolution: true,
                related_entity_type: Some("APPROVAL".to_string()),
                related_entity_id: Some("42".to_string()),
                ..to_module(Some(ModuleType::Sales))
            },
            t + Duration::seconds(1),
        )
        .await;
        f.notifications.resolve_for_entity("APPROVAL", "42").await.unwrap();

        let missed = f
            .reconciler
            .missed_since(None, None, Some(ModuleType::Sales), Some(t))
            .await
            .unwrap();
        assert!(missed.is_empty());
    }

    async fn register(devices: &MemoryDeviceStore, device_id: &str, username: &str, at: DateTime<Utc>) {
        devices
            .upsert(
                &DeviceUpsert {
                    device_id: device_id.to_string(),
                    username: username.to_string(),
                    user_id: None,
                    module_type: ModuleType::Sales,
                },
                at,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_one_reader_does_not_hide_rows_from_another() {
        let f = fixture();
        let t = Utc::now();
        register(&f.devices, "dev-alice", "alice", t).await;
        register(&f.devices, "dev-carol", "carol", t).await;
        let sales = add(
            &f.notifications,
            to_module(Some(ModuleType::Sales)),
            t + Duration::seconds(1),
        )
        .await;
        let all = add(&f.notifications, to_module(None), t + Duration::seconds(2)).await;

        f.notifications
            .mark_all_read(
                &bizhub_database::store::ReadScope::Module(ModuleType::Sales),
                "alice",
                t + Duration::seconds(3),
            )
            .await
            .unwrap();

        let for_alice = f
            .reconciler
            .missed_since(None, Some("dev-alice"), None, Some(t))
            .await
            .unwrap();
        assert!(for_alice.is_empty());

        let for_carol: Vec<_> = f
            .reconciler
            .missed_since(None, Some("dev-carol"), None, Some(t))
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(for_carol, vec![sales.id, all.id]);

        let for_pricing: Vec<_> = f
            .reconciler
            .missed_since(Some("eve"), None, Some(ModuleType::Pricing), Some(t))
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(for_pricing, vec![all.id]);

        let module_wide = f
            .reconciler
            .missed_since(None, None, Some(ModuleType::Sales), Some(t))
            .await
            .unwrap();
        assert_eq!(module_wide.len(), 2);
    }

    #[tokio::test]
    async fn test_storage_catches_up_on_every_module() {
        let f = fixture();
        let t = Utc::now();
        let sales = add(
            &f.notifications,
            to_module(Some(ModuleType::Sales)),
            t + Duration::seconds(1),
        )
        .await;

        let missed = f
            .reconciler
            .missed_since(Some("bob"), None, Some(ModuleType::Storage), Some(t))
            .await
            .unwrap();
        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].id, sales.id);
    }
}
