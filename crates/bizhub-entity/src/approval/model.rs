//! Approval request entity model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use bizhub_core::types::ApprovalId;

use super::ApprovalStatus;
use crate::module::ModuleType;

/// Days between creation and expiry of every approval request.
pub const APPROVAL_GRACE_DAYS: i64 = 2;

/// The fixed window an approver has to decide.
pub fn grace_period() -> Duration {
    Duration::days(APPROVAL_GRACE_DAYS)
}

/// A request from one module asking another module's role-holders for
/// permission. Rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApprovalRequest {
    /// Unique request identifier.
    pub id: ApprovalId,
    /// Free-form request type tag (e.g. `ADD_ELEMENT`).
    pub request_type: String,
    /// Username of the requester.
    pub requester_username: String,
    /// Numeric user id of the requester, if known.
    pub requester_user_id: Option<i64>,
    /// Module the request came from; decisions are announced there.
    pub requester_module: ModuleType,
    /// Role whose holders may decide.
    pub approver_role: ModuleType,
    /// Restricts the decision to one specific user.
    pub target_approver_id: Option<i64>,
    /// Linked project, if any.
    pub project_id: Option<i64>,
    /// Linked item, if any.
    pub item_id: Option<i64>,
    /// Requested quantity.
    pub quantity: i32,
    /// Free-text notes from the requester.
    pub notes: Option<String>,
    /// Current status.
    pub status: ApprovalStatus,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// Deadline; always `created_at + 2 days`.
    pub expires_at: DateTime<Utc>,
    /// When the request left `Pending`.
    pub processed_at: Option<DateTime<Utc>>,
    /// Who decided (`system` for timeouts).
    pub processed_by: Option<String>,
    /// Decision notes or rejection reason.
    pub processing_notes: Option<String>,
}

/// Input for a new approval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewApprovalRequest {
    /// Free-form request type tag.
    pub request_type: String,
    /// Username of the requester.
    pub requester_username: String,
    /// Numeric user id of the requester.
    pub requester_user_id: Option<i64>,
    /// Module the request comes from.
    pub requester_module: ModuleType,
    /// Role whose holders may decide.
    pub approver_role: ModuleType,
    /// Restricts the decision to one specific user.
    pub target_approver_id: Option<i64>,
    /// Linked project.
    pub project_id: Option<i64>,
    /// Linked item.
    pub item_id: Option<i64>,
    /// Requested quantity.
    pub quantity: i32,
    /// Free-text notes.
    pub notes: Option<String>,
}

impl ApprovalRequest {
    /// Build a pending request created at `now`.
    pub fn new(input: NewApprovalRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: ApprovalId::new(),
            request_type: input.request_type,
            requester_username: input.requester_username,
            requester_user_id: input.requester_user_id,
            requester_module: input.requester_module,
            approver_role: input.approver_role,
            target_approver_id: input.target_approver_id,
            project_id: input.project_id,
            item_id: input.item_id,
            quantity: input.quantity,
            notes: input.notes,
            status: ApprovalStatus::Pending,
            created_at: now,
            expires_at: now + grace_period(),
            processed_at: None,
            processed_by: None,
            processing_notes: None,
        }
    }

    /// Check if the request still awaits a decision.
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Check if the deadline has passed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check if the given user id may decide this request.
    pub fn accepts_approver(&self, user_id: Option<i64>) -> bool {
        match self.target_approver_id {
            Some(target) => user_id == Some(target),
            None => true,
        }
    }
}
