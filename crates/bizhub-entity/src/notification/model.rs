//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use bizhub_core::types::NotificationId;

use super::{NotificationAction, NotificationPriority};
use crate::module::ModuleType;

/// `related_entity_type` used by approval prompts and outcomes.
pub const APPROVAL_ENTITY: &str = "APPROVAL";

/// A persisted notification.
///
/// `target_module = None` together with `target_device_id = None` is a
/// broadcast to every module.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: NotificationId,
    /// Free-form type tag (e.g. `APPROVAL`, `STOCK`).
    pub notification_type: String,
    /// What happened.
    pub action: NotificationAction,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Addressed to one device only.
    pub target_device_id: Option<String>,
    /// Addressed to one module; `None` means all modules.
    pub target_module: Option<ModuleType>,
    /// Delivery priority.
    pub priority: NotificationPriority,
    /// Username of the originator.
    pub created_by: String,
    /// Device that originated the event.
    pub source_device_id: Option<String>,
    /// Module that originated the event.
    pub source_module: Option<ModuleType>,
    /// Do not deliver back to the source device.
    pub exclude_sender: bool,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
    /// Whether the underlying action has been dealt with.
    pub resolved: bool,
    /// Kind of the related entity (e.g. `APPROVAL`).
    pub related_entity_type: Option<String>,
    /// Identifier of the related entity.
    pub related_entity_id: Option<String>,
    /// Additional structured data.
    pub metadata: Option<serde_json::Value>,
}

/// Input for a new notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewNotification {
    /// Free-form type tag.
    pub notification_type: String,
    /// What happened.
    pub action: Option<NotificationAction>,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Addressed to one device only.
    pub target_device_id: Option<String>,
    /// Addressed to one module; `None` means all modules.
    pub target_module: Option<ModuleType>,
    /// Delivery priority.
    pub priority: NotificationPriority,
    /// Username of the originator.
    pub created_by: String,
    /// Device that originated the event.
    pub source_device_id: Option<String>,
    /// Module that originated the event.
    pub source_module: Option<ModuleType>,
    /// Do not deliver back to the source device.
    pub exclude_sender: bool,
    /// Starts unresolved (approval prompts).
    pub requires_resolution: bool,
    /// Kind of the related entity.
    pub related_entity_type: Option<String>,
    /// Identifier of the related entity.
    pub related_entity_id: Option<String>,
    /// Additional structured data.
    pub metadata: Option<serde_json::Value>,
}

impl Notification {
    /// Build a notification created at `now`.
    pub fn new(input: NewNotification, now: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::new(),
            notification_type: input.notification_type,
            action: input.action.unwrap_or(NotificationAction::System),
            title: input.title,
            message: input.message,
            target_device_id: input.target_device_id,
            target_module: input.target_module,
            priority: input.priority,
            created_by: input.created_by,
            source_device_id: input.source_device_id,
            source_module: input.source_module,
            exclude_sender: input.exclude_sender,
            created_at: now,
            resolved: !input.requires_resolution,
            related_entity_type: input.related_entity_type,
            related_entity_id: input.related_entity_id,
            metadata: input.metadata,
        }
    }

    /// Addressed to no device and no module.
    pub fn is_broadcast(&self) -> bool {
        self.target_device_id.is_none() && self.target_module.is_none()
    }

    /// Whether a client of `module` should see this notification, ignoring
    /// device targeting. Storage sees every module's traffic.
    pub fn is_visible_to_module(&self, module: ModuleType) -> bool {
        match self.target_module {
            None => true,
            Some(target) => module.follows(target),
        }
    }

    /// Unread state for one reader. Approval prompts stay unread for
    /// everyone until decided and never after; other rows are unread until
    /// the reader has a receipt.
    pub fn is_unread_for(&self, has_receipt: bool) -> bool {
        if self.action == NotificationAction::ApprovalRequested {
            !self.resolved
        } else {
            !has_receipt
        }
    }

    /// An approval prompt still awaiting a decision.
    pub fn is_open_prompt(&self) -> bool {
        self.action == NotificationAction::ApprovalRequested && !self.resolved
    }
}
