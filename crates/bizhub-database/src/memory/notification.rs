//! In-memory notification store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use bizhub_core::error::AppError;
use bizhub_core::result::AppResult;
use bizhub_core::types::NotificationId;
use bizhub_entity::ModuleType;
use bizhub_entity::notification::{Notification, NotificationAction, NotificationReceipt};

use crate::store::{NotificationStore, ReadScope};

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order doubles as the tie-breaker for equal timestamps.
    rows: Vec<Notification>,
    receipts: HashMap<(NotificationId, String), NotificationReceipt>,
}

impl Inner {
    fn has_receipt(&self, id: NotificationId, reader: &str) -> bool {
        self.receipts.contains_key(&(id, reader.to_string()))
    }

    fn is_unread(&self, n: &Notification, reader: Option<&str>) -> bool {
        match reader {
            Some(reader) => n.is_unread_for(self.has_receipt(n.id, reader)),
            None => n.is_unread_for(false),
        }
    }
}

/// Notifications and receipts held behind one lock.
#[derive(Debug, Default)]
pub struct MemoryNotificationStore {
    inner: RwLock<Inner>,
    failing_inserts: AtomicU32,
}

impl MemoryNotificationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` inserts fail with a persistence error.
    pub fn fail_next_inserts(&self, n: u32) {
        self.failing_inserts.store(n, Ordering::SeqCst);
    }

    async fn select(&self, predicate: impl Fn(&Inner, &Notification) -> bool) -> Vec<Notification> {
        let guard = self.inner.read().await;
        let mut found: Vec<Notification> = guard
            .rows
            .iter()
            .filter(|n| predicate(&guard, n))
            .cloned()
            .collect();
        found.sort_by_key(|n| n.created_at);
        found
    }
}

fn in_module_scope(n: &Notification, module: ModuleType) -> bool {
    n.target_device_id.is_none() && n.is_visible_to_module(module)
}

fn in_read_scope(n: &Notification, scope: &ReadScope) -> bool {
    match scope {
        ReadScope::Device(device_id) => n.target_device_id.as_deref() == Some(device_id.as_str()),
        ReadScope::Module(module) => in_module_scope(n, *module),
    }
}

fn record_receipt(inner: &mut Inner, id: NotificationId, username: &str, at: DateTime<Utc>) {
    inner
        .receipts
        .entry((id, username.to_string()))
        .or_insert_with(|| NotificationReceipt {
            notification_id: id,
            username: username.to_string(),
            read_at: at,
        });
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, notification: &Notification) -> AppResult<Notification> {
        let failing = self
            .failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(AppError::persistence("Notification insert rejected"));
        }
        self.inner.write().await.rows.push(notification.clone());
        Ok(notification.clone())
    }

    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        let guard = self.inner.read().await;
        Ok(guard.rows.iter().find(|n| n.id == id).cloned())
    }

    async fn unread_for_device(
        &self,
        device_id: &str,
        reader: Option<&str>,
    ) -> AppResult<Vec<Notification>> {
        Ok(self
            .select(|inner, n| {
                n.target_device_id.as_deref() == Some(device_id) && inner.is_unread(n, reader)
            })
            .await)
    }

    async fn unread_for_module(
        &self,
        module: ModuleType,
        reader: Option<&str>,
    ) -> AppResult<Vec<Notification>> {
        Ok(self
            .select(|inner, n| in_module_scope(n, module) && inner.is_unread(n, reader))
            .await)
    }

    async fn for_module_since(
        &self,
        module: ModuleType,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        Ok(self
            .select(|_, n| n.created_at > since && in_module_scope(n, module))
            .await)
    }

    async fn unread_for_module_since(
        &self,
        module: ModuleType,
        since: DateTime<Utc>,
        reader: Option<&str>,
    ) -> AppResult<Vec<Notification>> {
        Ok(self
            .select(|inner, n| {
                n.created_at > since && in_module_scope(n, module) && inner.is_unread(n, reader)
            })
            .await)
    }

    async fn broadcast(&self, limit: i64) -> AppResult<Vec<Notification>> {
        let mut found = self.select(|_, n| n.is_broadcast()).await;
        found.reverse();
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }

    async fn unresolved_by_action(
        &self,
        action: NotificationAction,
        module: Option<ModuleType>,
    ) -> AppResult<Vec<Notification>> {
        Ok(self
            .select(|_, n| {
                n.action == action
                    && !n.resolved
                    && module.is_none_or(|m| n.is_visible_to_module(m))
            })
            .await)
    }

    async fn count_unread_for_device(&self, device_id: &str, reader: &str) -> AppResult<i64> {
        Ok(self.unread_for_device(device_id, Some(reader)).await?.len() as i64)
    }

    async fn count_unread_for_module(&self, module: ModuleType, reader: &str) -> AppResult<i64> {
        Ok(self.unread_for_module(module, Some(reader)).await?.len() as i64)
    }

    async fn mark_read(
        &self,
        id: NotificationId,
        username: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut guard = self.inner.write().await;
        if !guard.rows.iter().any(|n| n.id == id) {
            return Ok(false);
        }
        record_receipt(&mut guard, id, username, at);
        Ok(true)
    }

    async fn mark_all_read(
        &self,
        scope: &ReadScope,
        username: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut guard = self.inner.write().await;
        let changed: Vec<NotificationId> = guard
            .rows
            .iter()
            .filter(|n| in_read_scope(n, scope) && !guard.has_receipt(n.id, username))
            .map(|n| n.id)
            .collect();
        for id in &changed {
            record_receipt(&mut guard, *id, username, at);
        }
        Ok(changed.len() as u64)
    }

    async fn resolve_for_entity(&self, entity_type: &str, entity_id: &str) -> AppResult<u64> {
        let mut guard = self.inner.write().await;
        let mut resolved = 0;
        for row in guard.rows.iter_mut() {
            if !row.resolved
                && row.related_entity_type.as_deref() == Some(entity_type)
                && row.related_entity_id.as_deref() == Some(entity_id)
            {
                row.resolved = true;
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    async fn delete_older_than(
        &self,
        before: DateTime<Utc>,
        keep_unresolved: bool,
    ) -> AppResult<u64> {
        let mut guard = self.inner.write().await;
        let before_len = guard.rows.len();
        guard
            .rows
            .retain(|n| n.created_at >= before || (keep_unresolved && n.is_open_prompt()));
        let kept: HashSet<NotificationId> = guard.rows.iter().map(|n| n.id).collect();
        guard.receipts.retain(|(id, _), _| kept.contains(id));
        Ok((before_len - guard.rows.len()) as u64)
    }

    async fn receipts_for(&self, id: NotificationId) -> AppResult<Vec<NotificationReceipt>> {
        let guard = self.inner.read().await;
        let mut found: Vec<NotificationReceipt> = guard
            .receipts
            .values()
            .filter(|r| r.notification_id == id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.read_at);
        Ok(found)
    }
}
