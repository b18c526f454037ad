//! Wire format for messages carried by the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bizhub_core::error::AppError;
use bizhub_core::types::NotificationId;
use bizhub_entity::ModuleType;
use bizhub_entity::notification::{Notification, NotificationAction, NotificationPriority};

/// A notification as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// Persisted notification id; the de-duplication key.
    pub id: NotificationId,
    /// Free-form type tag.
    #[serde(rename = "type")]
    pub notification_type: String,
    /// Originating module.
    pub module: Option<ModuleType>,
    /// What happened.
    pub action: NotificationAction,
    /// Related entity kind.
    pub entity_type: Option<String>,
    /// Related entity id.
    pub entity_id: Option<String>,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Addressed to one device only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_device_id: Option<String>,
    /// Addressed to one module; absent means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_module: Option<ModuleType>,
    /// Delivery priority.
    pub priority: NotificationPriority,
    /// Originating username.
    pub created_by: String,
    /// Originating device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_device_id: Option<String>,
    /// Do not show on the originating device.
    pub exclude_sender: bool,
    /// Whether the underlying action is settled.
    pub resolved: bool,
    /// Creation time of the persisted row.
    pub timestamp: DateTime<Utc>,
    /// Additional structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl From<&Notification> for NotificationEvent {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            notification_type: n.notification_type.clone(),
            module: n.source_module,
            action: n.action,
            entity_type: n.related_entity_type.clone(),
            entity_id: n.related_entity_id.clone(),
            title: n.title.clone(),
            message: n.message.clone(),
            target_device_id: n.target_device_id.clone(),
            target_module: n.target_module,
            priority: n.priority,
            created_by: n.created_by.clone(),
            source_device_id: n.source_device_id.clone(),
            exclude_sender: n.exclude_sender,
            resolved: n.resolved,
            timestamp: n.created_at,
            metadata: n.metadata.clone(),
        }
    }
}

/// Everything published on a notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireMessage {
    /// A new notification.
    Notification(NotificationEvent),
    /// Notifications about an entity were resolved; clients drop any
    /// prompt they still show for it.
    Resolved {
        /// Entity kind, e.g. `APPROVAL`.
        entity_type: String,
        /// Entity id.
        entity_id: String,
        /// When it was resolved.
        timestamp: DateTime<Utc>,
    },
}

impl WireMessage {
    /// Serialize for the broker.
    pub fn encode(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a broker payload.
    pub fn decode(payload: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(payload)?)
    }
}
