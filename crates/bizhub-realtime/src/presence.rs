//! Heartbeat-based device presence.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info, warn};

use bizhub_core::config::PresenceConfig;
use bizhub_core::error::AppError;
use bizhub_core::result::AppResult;
use bizhub_core::traits::Clock;
use bizhub_database::store::{DeviceStore, DeviceUpsert};
use bizhub_entity::ModuleType;
use bizhub_entity::device::{DeviceRegistration, DeviceStatus};

use crate::client::HeartbeatSink;

/// Outcome of one stale sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StaleSweepReport {
    /// Devices found past the threshold.
    pub examined: usize,
    /// Devices moved to offline.
    pub marked_offline: usize,
    /// Devices that heartbeated between the scan and the update.
    pub refreshed: usize,
    /// Devices whose update failed.
    pub failed: usize,
}

/// Tracks which client devices are alive.
#[derive(Clone)]
pub struct PresenceRegistry {
    devices: Arc<dyn DeviceStore>,
    clock: Arc<dyn Clock>,
    config: PresenceConfig,
}

impl std::fmt::Debug for PresenceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceRegistry")
            .field("config", &self.config)
            .finish()
    }
}

impl PresenceRegistry {
    /// Create a registry over a device store.
    pub fn new(devices: Arc<dyn DeviceStore>, clock: Arc<dyn Clock>, config: PresenceConfig) -> Self {
        Self {
            devices,
            clock,
            config,
        }
    }

    /// Age after which a silent device is considered gone.
    pub fn stale_threshold(&self) -> Duration {
        self.config.stale_threshold()
    }

    /// Register a device, or reactivate the existing row for it.
    pub async fn register_or_reactivate(
        &self,
        device_id: &str,
        username: &str,
        user_id: Option<i64>,
        module: ModuleType,
    ) -> AppResult<DeviceRegistration> {
        if device_id.trim().is_empty() {
            return Err(AppError::validation("Device id must not be empty"));
        }

        let device = self
            .devices
            .upsert(
                &DeviceUpsert {
                    device_id: device_id.to_string(),
                    username: username.to_string(),
                    user_id,
                    module_type: module,
                },
                self.clock.now(),
            )
            .await?;

        info!(
            device_id = %device.device_id,
            username = %device.username,
            module = %device.module_type,
            "Device registered"
        );
        Ok(device)
    }

    /// Record a heartbeat.
    pub async fn heartbeat(&self, device_id: &str) -> AppResult<DeviceRegistration> {
        let device = self
            .devices
            .touch_heartbeat(device_id, self.clock.now())
            .await?
            .ok_or_else(|| not_registered(device_id))?;

        debug!(device_id, status = %device.status, "Heartbeat");
        Ok(device)
    }

    /// Mark a device idle. It keeps receiving live messages.
    pub async fn set_idle(&self, device_id: &str) -> AppResult<DeviceRegistration> {
        let device = self
            .devices
            .set_status(device_id, DeviceStatus::Idle)
            .await?
            .ok_or_else(|| not_registered(device_id))?;

        info!(device_id, "Device idle");
        Ok(device)
    }

    /// Mark every device silent for longer than `threshold` offline.
    ///
    /// Each row is updated on its own, so one failure does not stop the
    /// sweep and a heartbeat that lands mid-sweep keeps its device online.
    pub async fn stale_sweep(&self, threshold: Duration) -> AppResult<StaleSweepReport> {
        let cutoff = self.clock.now() - threshold;
        let stale = self.devices.find_stale(cutoff).await?;
        let mut report = StaleSweepReport {
            examined: stale.len(),
            ..Default::default()
        };

        for device in stale {
            match self
                .devices
                .mark_offline_if_stale(&device.device_id, cutoff)
                .await
            {
                Ok(true) => {
                    report.marked_offline += 1;
                    info!(
                        device_id = %device.device_id,
                        last_heartbeat = %device.last_heartbeat,
                        "Device marked offline"
                    );
                }
                Ok(false) => report.refreshed += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(device_id = %device.device_id, error = %e, "Failed to mark device offline");
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                marked_offline = report.marked_offline,
                failed = report.failed,
                "Stale device sweep complete"
            );
        }
        Ok(report)
    }

    /// Soft-delete a device; its row stays for catch-up anchoring.
    pub async fn deactivate(&self, device_id: &str) -> AppResult<DeviceRegistration> {
        let device = self
            .devices
            .deactivate(device_id, self.clock.now())
            .await?
            .ok_or_else(|| not_registered(device_id))?;

        info!(device_id, "Device deactivated");
        Ok(device)
    }

    /// Devices currently reachable, optionally for one module.
    pub async fn online_devices(
        &self,
        module: Option<ModuleType>,
    ) -> AppResult<Vec<DeviceRegistration>> {
        self.devices.online(module).await
    }

    /// Look up a device.
    pub async fn find(&self, device_id: &str) -> AppResult<Option<DeviceRegistration>> {
        self.devices.find(device_id).await
    }
}

fn not_registered(device_id: &str) -> AppError {
    AppError::not_found(format!("Device '{device_id}' is not registered"))
}

#[async_trait]
impl HeartbeatSink for PresenceRegistry {
    async fn beat(&self, device_id: &str) -> AppResult<()> {
        self.heartbeat(device_id).await.map(|_| ())
    }
}
