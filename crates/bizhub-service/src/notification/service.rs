//! Notification publishing, queries and read state.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use bizhub_core::error::AppError;
use bizhub_core::result::AppResult;
use bizhub_core::traits::Clock;
use bizhub_core::types::NotificationId;
use bizhub_database::store::{NotificationStore, ReadScope};
use bizhub_entity::ModuleType;
use bizhub_entity::notification::{
    NewNotification, Notification, NotificationAction, NotificationReceipt,
};
use bizhub_realtime::{CatchUpReconciler, Fanout};

use crate::context::RequestContext;

/// Upper bound on rows returned by the broadcast query.
pub const MAX_BROADCAST_LIMIT: i64 = 200;

/// Unread counters for one client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnreadCount {
    /// Addressed to the device.
    pub device: i64,
    /// Addressed to the module or everyone.
    pub module: i64,
    /// Sum of both.
    pub total: i64,
}

/// Publishes domain events and answers client notification queries.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    fanout: Arc<Fanout>,
    reconciler: CatchUpReconciler,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("fanout", &self.fanout)
            .finish()
    }
}

impl NotificationService {
    /// Creates a new notification service.
    pub fn new(
        fanout: Arc<Fanout>,
        reconciler: CatchUpReconciler,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: fanout.store().clone(),
            fanout,
            reconciler,
            clock,
        }
    }

    /// Publish a domain event on behalf of the caller.
    ///
    /// Missing sender fields are filled from the context.
    pub async fn publish(
        &self,
        ctx: &RequestContext,
        mut input: NewNotification,
    ) -> AppResult<Notification> {
        if input.title.trim().is_empty() {
            return Err(AppError::validation("Notification title must not be empty"));
        }
        if input.notification_type.trim().is_empty() {
            return Err(AppError::validation("Notification type must not be empty"));
        }
        if input.created_by.is_empty() {
            input.created_by = ctx.username.clone();
        }
        if input.source_device_id.is_none() {
            input.source_device_id = ctx.device_id.clone();
        }
        if input.source_module.is_none() {
            input.source_module = Some(ctx.role);
        }

        let notification = self.fanout.publish(input).await?;
        info!(
            notification_id = %notification.id,
            created_by = %notification.created_by,
            target_module = ?notification.target_module,
            target_device = ?notification.target_device_id,
            "Domain event published"
        );
        Ok(notification)
    }

    /// Notifications for a device and its module that the caller has not
    /// read, oldest first. Open approval prompts stay listed for every
    /// approver until one of them decides.
    pub async fn list_unread(
        &self,
        ctx: &RequestContext,
        device_id: Option<&str>,
        module: Option<ModuleType>,
    ) -> AppResult<Vec<Notification>> {
        let module = module.unwrap_or(ctx.role);
        let device_id = device_id.or(ctx.device_id.as_deref());

        let reader = Some(ctx.username.as_str());

        let mut found = match device_id {
            Some(id) => self.store.unread_for_device(id, reader).await?,
            None => Vec::new(),
        };
        found.extend(self.store.unread_for_module(module, reader).await?);

        let mut seen = HashSet::new();
        found.retain(|n| seen.insert(n.id));
        found.sort_by_key(|n| n.created_at);
        Ok(found)
    }

    /// Unread counters for the caller's device and module.
    pub async fn unread_count(
        &self,
        ctx: &RequestContext,
        device_id: Option<&str>,
        module: Option<ModuleType>,
    ) -> AppResult<UnreadCount> {
        let module = module.unwrap_or(ctx.role);
        let device = match device_id.or(ctx.device_id.as_deref()) {
            Some(id) => self.store.count_unread_for_device(id, &ctx.username).await?,
            None => 0,
        };
        let module = self
            .store
            .count_unread_for_module(module, &ctx.username)
            .await?;
        Ok(UnreadCount {
            device,
            module,
            total: device + module,
        })
    }

    /// Record that the caller read one notification.
    pub async fn mark_read(&self, ctx: &RequestContext, id: NotificationId) -> AppResult<()> {
        if !self
            .store
            .mark_read(id, &ctx.username, self.clock.now())
            .await?
        {
            return Err(AppError::not_found(format!("Notification {id} not found")));
        }
        info!(notification_id = %id, username = %ctx.username, "Notification read");
        Ok(())
    }

    /// Record that the caller read everything in `scope`.
    pub async fn mark_all_read(&self, ctx: &RequestContext, scope: ReadScope) -> AppResult<u64> {
        let changed = self
            .store
            .mark_all_read(&scope, &ctx.username, self.clock.now())
            .await?;
        info!(username = %ctx.username, ?scope, changed, "Notifications marked read");
        Ok(changed)
    }

    /// What a reconnecting client missed. Rows `reader` already read are
    /// left out; without a reader every row in range is returned.
    pub async fn missed_since(
        &self,
        reader: Option<&str>,
        device_id: Option<&str>,
        module: Option<ModuleType>,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Notification>> {
        self.reconciler
            .missed_since(reader, device_id, module, since)
            .await
    }

    /// Latest notifications addressed to everyone.
    pub async fn broadcast(&self, limit: i64) -> AppResult<Vec<Notification>> {
        self.store
            .broadcast(limit.clamp(1, MAX_BROADCAST_LIMIT))
            .await
    }

    /// Approval prompts still waiting for a decision.
    pub async fn open_prompts(&self, module: Option<ModuleType>) -> AppResult<Vec<Notification>> {
        self.store
            .unresolved_by_action(NotificationAction::ApprovalRequested, module)
            .await
    }

    /// Who has read a notification.
    pub async fn receipts(&self, id: NotificationId) -> AppResult<Vec<NotificationReceipt>> {
        self.store.receipts_for(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizhub_core::config::BrokerConfig;
    use bizhub_core::error::ErrorKind;
    use bizhub_core::traits::ManualClock;
    use bizhub_database::StoreBundle;
    use bizhub_realtime::broker::MemoryBroker;

    fn service() -> NotificationService {
        let stores = StoreBundle::in_memory();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let fanout = Arc::new(Fanout::new(
            stores.notifications.clone(),
            stores.devices.clone(),
            Arc::new(MemoryBroker::new()),
            clock.clone(),
            &BrokerConfig::default(),
        ));
        NotificationService::new(
            fanout,
            CatchUpReconciler::new(stores.notifications, stores.devices),
            clock,
        )
    }

    fn event(target: Option<ModuleType>, device: Option<&str>) -> NewNotification {
        NewNotification {
            notification_type: "STOCK".to_string(),
            title: "Stock changed".to_string(),
            target_module: target,
            target_device_id: device.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_publish_fills_sender_from_context() {
        let svc = service();
        let ctx = RequestContext::new("bob", Some(2), ModuleType::Storage).with_device("dev-b");

        let n = svc.publish(&ctx, event(Some(ModuleType::Sales), None)).await.unwrap();

        assert_eq!(n.created_by, "bob");
        assert_eq!(n.source_device_id.as_deref(), Some("dev-b"));
        assert_eq!(n.source_module, Some(ModuleType::Storage));
    }

    #[tokio::test]
    async fn test_publish_requires_title() {
        let svc = service();
        let ctx = RequestContext::new("bob", None, ModuleType::Storage);
        let mut input = event(None, None);
        input.title = "  ".to_string();

        let err = svc.publish(&ctx, input).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_unread_lists_and_counts() {
        let svc = service();
        let bob = RequestContext::new("bob", None, ModuleType::Storage);
        let alice = RequestContext::new("alice", None, ModuleType::Sales).with_device("dev-a");
        svc.publish(&bob, event(Some(ModuleType::Sales), None)).await.unwrap();
        svc.publish(&bob, event(None, None)).await.unwrap();
        svc.publish(&bob, event(None, Some("dev-a"))).await.unwrap();
        svc.publish(&bob, event(Some(ModuleType::Pricing), None)).await.unwrap();

        let unread = svc.list_unread(&alice, None, None).await.unwrap();
        assert_eq!(unread.len(), 3);
        let count = svc.unread_count(&alice, None, None).await.unwrap();
        assert_eq!(
            count,
            UnreadCount {
                device: 1,
                module: 2,
                total: 3
            }
        );

        svc.mark_read(&alice, unread[0].id).await.unwrap();
        assert_eq!(svc.receipts(unread[0].id).await.unwrap()[0].username, "alice");
        let changed = svc
            .mark_all_read(&alice, ReadScope::Module(ModuleType::Sales))
            .await
            .unwrap();
        assert_eq!(changed, 2);
        assert_eq!(svc.unread_count(&alice, None, None).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_read_by_one_user_stays_unread_for_another() {
        let svc = service();
        let bob = RequestContext::new("bob", None, ModuleType::Storage);
        let alice = RequestContext::new("alice", None, ModuleType::Sales);
        let carol = RequestContext::new("carol", None, ModuleType::Sales);
        let eve = RequestContext::new("eve", None, ModuleType::Pricing);
        let everyone = svc.publish(&bob, event(None, None)).await.unwrap();

        svc.mark_read(&alice, everyone.id).await.unwrap();

        assert_eq!(svc.unread_count(&alice, None, None).await.unwrap().total, 0);
        assert_eq!(svc.unread_count(&carol, None, None).await.unwrap().total, 1);
        let for_eve = svc.list_unread(&eve, None, None).await.unwrap();
        assert_eq!(for_eve.len(), 1);
        assert_eq!(for_eve[0].id, everyone.id);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_is_not_found() {
        let svc = service();
        let ctx = RequestContext::new("alice", None, ModuleType::Sales);
        let err = svc.mark_read(&ctx, NotificationId::new()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
