//! Per-user read receipt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use bizhub_core::types::NotificationId;

/// Records that a user has seen a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct NotificationReceipt {
    /// The notification that was read.
    pub notification_id: NotificationId,
    /// The reading user.
    pub username: String,
    /// When it was read.
    pub read_at: DateTime<Utc>,
}
