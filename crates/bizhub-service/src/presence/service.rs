//! Presence operations on behalf of the calling user.

use std::sync::Arc;

use bizhub_core::error::AppError;
use bizhub_core::result::AppResult;
use bizhub_entity::ModuleType;
use bizhub_entity::device::DeviceRegistration;
use bizhub_realtime::PresenceRegistry;

use crate::context::RequestContext;

/// Registers and maintains the caller's devices.
#[derive(Debug, Clone)]
pub struct PresenceService {
    registry: Arc<PresenceRegistry>,
}

impl PresenceService {
    /// Creates a new presence service.
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    /// Register the caller's device. The module defaults to the caller's role.
    pub async fn register(
        &self,
        ctx: &RequestContext,
        device_id: &str,
        module: Option<ModuleType>,
    ) -> AppResult<DeviceRegistration> {
        self.registry
            .register_or_reactivate(
                device_id,
                &ctx.username,
                ctx.user_id,
                module.unwrap_or(ctx.role),
            )
            .await
    }

    /// Heartbeat for one of the caller's devices.
    pub async fn heartbeat(
        &self,
        ctx: &RequestContext,
        device_id: &str,
    ) -> AppResult<DeviceRegistration> {
        self.ensure_owned(ctx, device_id).await?;
        self.registry.heartbeat(device_id).await
    }

    /// Mark one of the caller's devices idle.
    pub async fn set_idle(
        &self,
        ctx: &RequestContext,
        device_id: &str,
    ) -> AppResult<DeviceRegistration> {
        self.ensure_owned(ctx, device_id).await?;
        self.registry.set_idle(device_id).await
    }

    /// Deactivate one of the caller's devices.
    pub async fn deactivate(
        &self,
        ctx: &RequestContext,
        device_id: &str,
    ) -> AppResult<DeviceRegistration> {
        self.ensure_owned(ctx, device_id).await?;
        self.registry.deactivate(device_id).await
    }

    /// Reachable devices, optionally for one module.
    pub async fn online(&self, module: Option<ModuleType>) -> AppResult<Vec<DeviceRegistration>> {
        self.registry.online_devices(module).await
    }

    async fn ensure_owned(&self, ctx: &RequestContext, device_id: &str) -> AppResult<()> {
        match self.registry.find(device_id).await? {
            Some(device) if device.username != ctx.username => Err(AppError::authorization(
                format!("Device '{device_id}' belongs to another user"),
            )),
            Some(_) => Ok(()),
            None => Err(AppError::not_found(format!(
                "Device '{device_id}' is not registered"
            ))),
        }
    }
}
