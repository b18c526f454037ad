//! Device registration entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::DeviceStatus;
use crate::module::ModuleType;

/// A client installation. `device_id` is generated by the client and is
/// stable across restarts; there is at most one row per `device_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeviceRegistration {
    /// Surrogate key.
    pub id: i64,
    /// Client-generated natural key.
    pub device_id: String,
    /// Logged-in username.
    pub username: String,
    /// Logged-in user id.
    pub user_id: Option<i64>,
    /// Module the client runs.
    pub module_type: ModuleType,
    /// Current liveness.
    pub status: DeviceStatus,
    /// Last heartbeat received.
    pub last_heartbeat: DateTime<Utc>,
    /// When the device was last deactivated.
    pub last_seen: Option<DateTime<Utc>>,
    /// Soft-delete flag.
    pub active: bool,
    /// First registration.
    pub created_at: DateTime<Utc>,
}

impl DeviceRegistration {
    /// Check if live messages should be sent to this device.
    pub fn is_reachable(&self) -> bool {
        self.active && self.status.is_reachable()
    }

    /// Reference point for catch-up when the client gives none.
    pub fn catch_up_anchor(&self) -> DateTime<Utc> {
        self.last_seen.unwrap_or(self.last_heartbeat)
    }
}
