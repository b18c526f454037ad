//! In-memory device store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use bizhub_core::result::AppResult;
use bizhub_entity::ModuleType;
use bizhub_entity::device::{DeviceRegistration, DeviceStatus};

use crate::store::{DeviceStore, DeviceUpsert};

/// Device registrations keyed by `device_id`.
#[derive(Debug)]
pub struct MemoryDeviceStore {
    devices: RwLock<HashMap<String, DeviceRegistration>>,
    next_id: AtomicI64,
}

impl MemoryDeviceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryDeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn upsert(
        &self,
        device: &DeviceUpsert,
        now: DateTime<Utc>,
    ) -> AppResult<DeviceRegistration> {
        let mut guard = self.devices.write().await;
        let row = guard
            .entry(device.device_id.clone())
            .or_insert_with(|| DeviceRegistration {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                device_id: device.device_id.clone(),
                username: device.username.clone(),
                user_id: device.user_id,
                module_type: device.module_type,
                status: DeviceStatus::Online,
                last_heartbeat: now,
                last_seen: None,
                active: true,
                created_at: now,
            });
        row.username = device.username.clone();
        row.user_id = device.user_id;
        row.module_type = device.module_type;
        row.status = DeviceStatus::Online;
        row.last_heartbeat = now;
        row.active = true;
        Ok(row.clone())
    }

    async fn find(&self, device_id: &str) -> AppResult<Option<DeviceRegistration>> {
        Ok(self.devices.read().await.get(device_id).cloned())
    }

    async fn touch_heartbeat(
        &self,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DeviceRegistration>> {
        let mut guard = self.devices.write().await;
        let Some(row) = guard.get_mut(device_id).filter(|r| r.active) else {
            return Ok(None);
        };
        row.last_heartbeat = now;
        if row.status == DeviceStatus::Offline {
            row.status = DeviceStatus::Online;
        }
        Ok(Some(row.clone()))
    }

    async fn set_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
    ) -> AppResult<Option<DeviceRegistration>> {
        let mut guard = self.devices.write().await;
        Ok(guard.get_mut(device_id).filter(|r| r.active).map(|row| {
            row.status = status;
            row.clone()
        }))
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<DeviceRegistration>> {
        let guard = self.devices.read().await;
        Ok(guard
            .values()
            .filter(|r| r.active && r.status != DeviceStatus::Offline && r.last_heartbeat <= cutoff)
            .cloned()
            .collect())
    }

    async fn mark_offline_if_stale(
        &self,
        device_id: &str,
        cutoff: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut guard = self.devices.write().await;
        match guard.get_mut(device_id) {
            Some(row) if row.status != DeviceStatus::Offline && row.last_heartbeat <= cutoff => {
                row.status = DeviceStatus::Offline;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate(
        &self,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DeviceRegistration>> {
        let mut guard = self.devices.write().await;
        Ok(guard.get_mut(device_id).map(|row| {
            row.active = false;
            row.status = DeviceStatus::Offline;
            row.last_seen = Some(now);
            row.clone()
        }))
    }

    async fn online(&self, module: Option<ModuleType>) -> AppResult<Vec<DeviceRegistration>> {
        let guard = self.devices.read().await;
        let mut found: Vec<DeviceRegistration> = guard
            .values()
            .filter(|r| r.is_reachable() && module.is_none_or(|m| r.module_type == m))
            .cloned()
            .collect();
        found.sort_by(|a, b| (&a.username, &a.device_id).cmp(&(&b.username, &b.device_id)));
        Ok(found)
    }
}
