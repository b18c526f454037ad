//! Device registration repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bizhub_core::error::{AppError, ErrorKind};
use bizhub_core::result::AppResult;
use bizhub_entity::ModuleType;
use bizhub_entity::device::{DeviceRegistration, DeviceStatus};

use crate::store::{DeviceStore, DeviceUpsert};

/// Repository for the `device_registrations` table.
#[derive(Debug, Clone)]
pub struct DeviceRepository {
    pool: PgPool,
}

impl DeviceRepository {
    /// Create a new device repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::PersistenceFailure, message, e)
}

#[async_trait]
impl DeviceStore for DeviceRepository {
    async fn upsert(
        &self,
        device: &DeviceUpsert,
        now: DateTime<Utc>,
    ) -> AppResult<DeviceRegistration> {
        sqlx::query_as::<_, DeviceRegistration>(
            "INSERT INTO device_registrations \
             (device_id, username, user_id, module_type, status, last_heartbeat, active, created_at) \
             VALUES ($1, $2, $3, $4, 'online', $5, TRUE, $5) \
             ON CONFLICT (device_id) DO UPDATE SET \
                username = EXCLUDED.username, \
                user_id = EXCLUDED.user_id, \
                module_type = EXCLUDED.module_type, \
                status = 'online', \
                last_heartbeat = EXCLUDED.last_heartbeat, \
                active = TRUE \
             RETURNING *",
        )
        .bind(&device.device_id)
        .bind(&device.username)
        .bind(device.user_id)
        .bind(device.module_type)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to register device"))
    }

    async fn find(&self, device_id: &str) -> AppResult<Option<DeviceRegistration>> {
        sqlx::query_as::<_, DeviceRegistration>(
            "SELECT * FROM device_registrations WHERE device_id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to find device"))
    }

    async fn touch_heartbeat(
        &self,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DeviceRegistration>> {
        sqlx::query_as::<_, DeviceRegistration>(
            "UPDATE device_registrations SET last_heartbeat = $2, \
             status = CASE WHEN status = 'offline' THEN 'online'::device_status ELSE status END \
             WHERE device_id = $1 AND active = TRUE \
             RETURNING *",
        )
        .bind(device_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to record heartbeat"))
    }

    async fn set_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
    ) -> AppResult<Option<DeviceRegistration>> {
        sqlx::query_as::<_, DeviceRegistration>(
            "UPDATE device_registrations SET status = $2 \
             WHERE device_id = $1 AND active = TRUE RETURNING *",
        )
        .bind(device_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to update device status"))
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<DeviceRegistration>> {
        sqlx::query_as::<_, DeviceRegistration>(
            "SELECT * FROM device_registrations \
             WHERE active = TRUE AND status IN ('online', 'idle') AND last_heartbeat <= $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to find stale devices"))
    }

    async fn mark_offline_if_stale(
        &self,
        device_id: &str,
        cutoff: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE device_registrations SET status = 'offline' \
             WHERE device_id = $1 AND status <> 'offline' AND last_heartbeat <= $2",
        )
        .bind(device_id)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to mark device offline"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn deactivate(
        &self,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DeviceRegistration>> {
        sqlx::query_as::<_, DeviceRegistration>(
            "UPDATE device_registrations SET active = FALSE, status = 'offline', last_seen = $2 \
             WHERE device_id = $1 RETURNING *",
        )
        .bind(device_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to deactivate device"))
    }

    async fn online(&self, module: Option<ModuleType>) -> AppResult<Vec<DeviceRegistration>> {
        sqlx::query_as::<_, DeviceRegistration>(
            "SELECT * FROM device_registrations \
             WHERE active = TRUE AND status <> 'offline' \
             AND ($1::module_type IS NULL OR module_type = $1) \
             ORDER BY username, device_id",
        )
        .bind(module)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list online devices"))
    }
}
