//! Notification repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bizhub_core::error::{AppError, ErrorKind};
use bizhub_core::result::AppResult;
use bizhub_core::types::NotificationId;
use bizhub_entity::ModuleType;
use bizhub_entity::notification::{Notification, NotificationAction, NotificationReceipt};

use crate::store::{NotificationStore, ReadScope};

/// Rows a module client should see: no device target, and addressed to the
/// module or to everyone. Storage sees every module. Expects the module as
/// `$1`.
const MODULE_SCOPE: &str = "target_device_id IS NULL \
     AND (target_module = $1 OR target_module IS NULL OR $1 = 'storage'::module_type)";

/// Unread for the reader bound at `$n`: open prompts always, decided prompts
/// never, other rows until the reader has a receipt. A null reader skips the
/// receipt check.
fn unread_for_reader(n: usize) -> String {
    format!(
        "(CASE WHEN action = 'approval_requested' THEN resolved = FALSE \
         ELSE (${n}::varchar IS NULL OR NOT EXISTS (SELECT 1 FROM notification_receipts r \
         WHERE r.notification_id = notifications.id AND r.username = ${n})) END)"
    )
}

/// Repository for the `notifications` and `notification_receipts` tables.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn scope_filter(scope: &ReadScope) -> &'static str {
    match scope {
        ReadScope::Device(_) => "target_device_id = $1",
        ReadScope::Module(_) => MODULE_SCOPE,
    }
}

fn bind_scope<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    scope: &ReadScope,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match scope {
        ReadScope::Device(device_id) => query.bind(device_id.clone()),
        ReadScope::Module(module) => query.bind(*module),
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn insert(&self, notification: &Notification) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (id, notification_type, action, title, message, \
             target_device_id, target_module, priority, created_by, source_device_id, \
             source_module, exclude_sender, created_at, resolved, \
             related_entity_type, related_entity_id, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING *",
        )
        .bind(notification.id)
        .bind(&notification.notification_type)
        .bind(notification.action)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.target_device_id)
        .bind(notification.target_module)
        .bind(notification.priority)
        .bind(&notification.created_by)
        .bind(&notification.source_device_id)
        .bind(notification.source_module)
        .bind(notification.exclude_sender)
        .bind(notification.created_at)
        .bind(notification.resolved)
        .bind(&notification.related_entity_type)
        .bind(&notification.related_entity_id)
        .bind(&notification.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::PersistenceFailure, "Failed to insert notification", e)
        })
    }

    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::PersistenceFailure, "Failed to find notification", e)
            })
    }

    async fn unread_for_device(
        &self,
        device_id: &str,
        reader: Option<&str>,
    ) -> AppResult<Vec<Notification>> {
        let sql = format!(
            "SELECT * FROM notifications WHERE target_device_id = $1 AND {} \
             ORDER BY created_at ASC",
            unread_for_reader(2)
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(device_id)
            .bind(reader)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::PersistenceFailure,
                    "Failed to list device notifications",
                    e,
                )
            })
    }

    async fn unread_for_module(
        &self,
        module: ModuleType,
        reader: Option<&str>,
    ) -> AppResult<Vec<Notification>> {
        let sql = format!(
            "SELECT * FROM notifications WHERE {MODULE_SCOPE} AND {} \
             ORDER BY created_at ASC",
            unread_for_reader(2)
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(module)
            .bind(reader)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::PersistenceFailure,
                    "Failed to list module notifications",
                    e,
                )
            })
    }

    async fn for_module_since(
        &self,
        module: ModuleType,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        let sql = format!(
            "SELECT * FROM notifications WHERE {MODULE_SCOPE} AND created_at > $2 \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(module)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::PersistenceFailure,
                    "Failed to list module notifications since",
                    e,
                )
            })
    }

    async fn unread_for_module_since(
        &self,
        module: ModuleType,
        since: DateTime<Utc>,
        reader: Option<&str>,
    ) -> AppResult<Vec<Notification>> {
        let sql = format!(
            "SELECT * FROM notifications WHERE {MODULE_SCOPE} AND created_at > $2 \
             AND {} ORDER BY created_at ASC",
            unread_for_reader(3)
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(module)
            .bind(since)
            .bind(reader)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::PersistenceFailure,
                    "Failed to list unread module notifications since",
                    e,
                )
            })
    }

    async fn broadcast(&self, limit: i64) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications \
             WHERE target_device_id IS NULL AND target_module IS NULL \
             ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::PersistenceFailure, "Failed to list broadcasts", e)
        })
    }

    async fn unresolved_by_action(
        &self,
        action: NotificationAction,
        module: Option<ModuleType>,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE action = $1 AND resolved = FALSE \
             AND ($2::module_type IS NULL OR $2 = 'storage'::module_type \
             OR target_module = $2 OR target_module IS NULL) \
             ORDER BY created_at ASC",
        )
        .bind(action)
        .bind(module)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::PersistenceFailure,
                "Failed to list unresolved notifications",
                e,
            )
        })
    }

    async fn count_unread_for_device(&self, device_id: &str, reader: &str) -> AppResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM notifications WHERE target_device_id = $1 AND {}",
            unread_for_reader(2)
        );
        sqlx::query_scalar(&sql)
            .bind(device_id)
            .bind(reader)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::PersistenceFailure, "Failed to count unread", e))
    }

    async fn count_unread_for_module(&self, module: ModuleType, reader: &str) -> AppResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM notifications WHERE {MODULE_SCOPE} AND {}",
            unread_for_reader(2)
        );
        sqlx::query_scalar(&sql)
            .bind(module)
            .bind(reader)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::PersistenceFailure, "Failed to count unread", e)
            })
    }

    async fn mark_read(
        &self,
        id: NotificationId,
        username: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO notification_receipts (notification_id, username, read_at) \
             SELECT id, $2, $3 FROM notifications WHERE id = $1 \
             ON CONFLICT (notification_id, username) DO NOTHING",
        )
        .bind(id)
        .bind(username)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::PersistenceFailure, "Failed to record receipt", e))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        Ok(self.find_by_id(id).await?.is_some())
    }

    async fn mark_all_read(
        &self,
        scope: &ReadScope,
        username: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let sql = format!(
            "INSERT INTO notification_receipts (notification_id, username, read_at) \
             SELECT id, $2, $3 FROM notifications WHERE {} \
             ON CONFLICT (notification_id, username) DO NOTHING",
            scope_filter(scope)
        );
        let result = bind_scope(sqlx::query(&sql), scope)
            .bind(username)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::PersistenceFailure, "Failed to record receipts", e)
            })?;
        Ok(result.rows_affected())
    }

    async fn resolve_for_entity(&self, entity_type: &str, entity_id: &str) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET resolved = TRUE \
             WHERE related_entity_type = $1 AND related_entity_id = $2 AND resolved = FALSE",
        )
        .bind(entity_type)
        .bind(entity_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::PersistenceFailure, "Failed to resolve notifications", e)
        })?;
        Ok(result.rows_affected())
    }

    async fn delete_older_than(
        &self,
        before: DateTime<Utc>,
        keep_unresolved: bool,
    ) -> AppResult<u64> {
        let sql = if keep_unresolved {
            "DELETE FROM notifications WHERE created_at < $1 \
             AND NOT (action = 'approval_requested' AND resolved = FALSE)"
        } else {
            "DELETE FROM notifications WHERE created_at < $1"
        };
        let result = sqlx::query(sql)
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::PersistenceFailure,
                    "Failed to delete old notifications",
                    e,
                )
            })?;
        Ok(result.rows_affected())
    }

    async fn receipts_for(&self, id: NotificationId) -> AppResult<Vec<NotificationReceipt>> {
        sqlx::query_as::<_, NotificationReceipt>(
            "SELECT * FROM notification_receipts WHERE notification_id = $1 ORDER BY read_at ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::PersistenceFailure, "Failed to list receipts", e))
    }
}
