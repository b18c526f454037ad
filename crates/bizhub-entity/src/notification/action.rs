//! Notification action enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

use bizhub_core::AppError;

/// What happened to the related entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    /// An entity was created.
    Created,
    /// An entity was updated.
    Updated,
    /// An entity was deleted.
    Deleted,
    /// An approval is awaiting a decision.
    ApprovalRequested,
    /// An approval was granted.
    ApprovalApproved,
    /// An approval was refused.
    ApprovalRejected,
    /// An approval expired without a decision.
    ApprovalTimedOut,
    /// System message.
    System,
}

impl NotificationAction {
    /// Return the action as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::ApprovalRequested => "approval_requested",
            Self::ApprovalApproved => "approval_approved",
            Self::ApprovalRejected => "approval_rejected",
            Self::ApprovalTimedOut => "approval_timed_out",
            Self::System => "system",
        }
    }
}

impl fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NotificationAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" | "create" => Ok(Self::Created),
            "updated" | "update" => Ok(Self::Updated),
            "deleted" | "delete" => Ok(Self::Deleted),
            "approval_requested" => Ok(Self::ApprovalRequested),
            "approval_approved" => Ok(Self::ApprovalApproved),
            "approval_rejected" => Ok(Self::ApprovalRejected),
            "approval_timed_out" => Ok(Self::ApprovalTimedOut),
            "system" => Ok(Self::System),
            _ => Err(AppError::validation(format!("Invalid action: '{s}'"))),
        }
    }
}
