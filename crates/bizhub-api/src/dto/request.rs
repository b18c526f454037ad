//! Request DTOs with validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use bizhub_core::error::AppError;
use bizhub_database::store::ReadScope;
use bizhub_entity::ModuleType;
use bizhub_entity::notification::{NewNotification, NotificationAction, NotificationPriority};
use bizhub_service::CreateApproval;
use bizhub_service::context::RequestContext;

/// Run the derived validation rules, mapping failures to `Validation`.
pub fn validated<T: Validate>(req: T) -> Result<T, AppError> {
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    Ok(req)
}

fn parse_module(raw: Option<&str>) -> Result<Option<ModuleType>, AppError> {
    raw.map(str::parse).transpose()
}

/// Publish a domain event.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PublishNotificationRequest {
    /// Free-form event type, e.g. `STOCK`.
    #[validate(length(min = 1, max = 64, message = "Type is required"))]
    #[serde(rename = "type")]
    pub notification_type: String,
    /// Action, defaults to `created`.
    pub action: Option<NotificationAction>,
    /// Title.
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    /// Body text.
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub message: String,
    /// Target module, or `ALL` for everyone.
    pub target_module: Option<String>,
    /// Target device.
    pub target_device_id: Option<String>,
    /// Priority, defaults to `normal`.
    pub priority: Option<NotificationPriority>,
    /// Hide from the sending device.
    #[serde(default)]
    pub exclude_sender: bool,
    /// Stays open until resolved.
    #[serde(default)]
    pub requires_resolution: bool,
    /// Related entity type.
    pub entity_type: Option<String>,
    /// Related entity id.
    pub entity_id: Option<String>,
    /// Structured payload.
    pub metadata: Option<serde_json::Value>,
}

impl PublishNotificationRequest {
    /// Convert into a store input.
    pub fn into_new(self) -> Result<NewNotification, AppError> {
        let target_module = match self.target_module.as_deref() {
            Some(raw) => ModuleType::parse_target(raw)?,
            None => None,
        };

        Ok(NewNotification {
            notification_type: self.notification_type,
            action: self.action,
            title: self.title,
            message: self.message,
            target_device_id: self.target_device_id,
            target_module,
            priority: self.priority.unwrap_or_default(),
            exclude_sender: self.exclude_sender,
            requires_resolution: self.requires_resolution,
            related_entity_type: self.entity_type,
            related_entity_id: self.entity_id,
            metadata: self.metadata,
            ..Default::default()
        })
    }
}

/// Device and module selector for notification queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationQuery {
    /// Device, defaults to the `x-device-id` header.
    pub device_id: Option<String>,
    /// Module, defaults to the caller's role.
    pub module: Option<String>,
}

impl NotificationQuery {
    /// Parsed module.
    pub fn module(&self) -> Result<Option<ModuleType>, AppError> {
        parse_module(self.module.as_deref())
    }
}

/// Catch-up query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissedQuery {
    /// Device, defaults to the `x-device-id` header.
    pub device_id: Option<String>,
    /// Module, defaults to the device's module.
    pub module: Option<String>,
    /// Exclusive lower bound, defaults to the device's last heartbeat.
    pub since: Option<DateTime<Utc>>,
}

impl MissedQuery {
    /// Parsed module.
    pub fn module(&self) -> Result<Option<ModuleType>, AppError> {
        parse_module(self.module.as_deref())
    }
}

/// Broadcast listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastQuery {
    /// Maximum rows (1-200, default 50).
    #[serde(default = "default_broadcast_limit")]
    pub limit: i64,
}

fn default_broadcast_limit() -> i64 {
    50
}

/// Mark everything read for a device or a module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadAllRequest {
    /// Device scope.
    pub device_id: Option<String>,
    /// Module scope, defaults to the caller's role.
    pub module: Option<String>,
}

impl ReadAllRequest {
    /// Resolve the scope; a device wins over a module.
    pub fn scope(&self, ctx: &RequestContext) -> Result<ReadScope, AppError> {
        if let Some(device_id) = self.device_id.as_deref().filter(|d| !d.is_empty()) {
            return Ok(ReadScope::Device(device_id.to_string()));
        }
        let module = parse_module(self.module.as_deref())?.unwrap_or(ctx.role);
        Ok(ReadScope::Module(module))
    }
}

/// Open an approval request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateApprovalRequest {
    /// Request type, e.g. `ADD_ELEMENT`.
    #[validate(length(min = 1, max = 64, message = "Request type is required"))]
    pub request_type: String,
    /// Module role that decides.
    pub approver_role: String,
    /// Restrict the decision to one user.
    pub target_approver_id: Option<i64>,
    /// Related project.
    pub project_id: Option<i64>,
    /// Related item.
    pub item_id: Option<i64>,
    /// Requested quantity.
    #[serde(default)]
    #[validate(range(min = 0, message = "Quantity must not be negative"))]
    pub quantity: i32,
    /// Requester notes.
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl CreateApprovalRequest {
    /// Convert into a workflow input.
    pub fn into_input(self) -> Result<CreateApproval, AppError> {
        Ok(CreateApproval {
            request_type: self.request_type,
            approver_role: self.approver_role.parse()?,
            target_approver_id: self.target_approver_id,
            project_id: self.project_id,
            item_id: self.item_id,
            quantity: self.quantity,
            notes: self.notes,
        })
    }
}

/// Approve or reject body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DecisionRequest {
    /// Notes or rejection reason.
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Pending approvals query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingQuery {
    /// Role, defaults to the caller's role.
    pub role: Option<String>,
}

impl PendingQuery {
    /// Parsed role.
    pub fn role(&self) -> Result<Option<ModuleType>, AppError> {
        parse_module(self.role.as_deref())
    }
}

/// Register a device.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterDeviceRequest {
    /// Stable device id.
    #[validate(length(min = 1, max = 128, message = "Device id is required"))]
    pub device_id: String,
    /// Module, defaults to the caller's role.
    pub module: Option<String>,
}

impl RegisterDeviceRequest {
    /// Parsed module.
    pub fn module(&self) -> Result<Option<ModuleType>, AppError> {
        parse_module(self.module.as_deref())
    }
}

/// Heartbeat, idle or deactivate body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRequest {
    /// Device, defaults to the `x-device-id` header.
    pub device_id: Option<String>,
}

impl DeviceRequest {
    /// The device this request is about.
    pub fn resolve(&self, ctx: &RequestContext) -> Result<String, AppError> {
        self.device_id
            .as_deref()
            .or(ctx.device_id.as_deref())
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("device_id is required"))
    }
}

/// Online device listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnlineQuery {
    /// Restrict to one module.
    pub module: Option<String>,
}

impl OnlineQuery {
    /// Parsed module.
    pub fn module(&self) -> Result<Option<ModuleType>, AppError> {
        parse_module(self.module.as_deref())
    }
}
