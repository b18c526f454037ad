//! Notifications emitted over an approval's lifecycle.

use serde_json::json;

use bizhub_entity::approval::{ApprovalRequest, ApprovalStatus};
use bizhub_entity::notification::{
    APPROVAL_ENTITY, NewNotification, NotificationAction, NotificationPriority,
};

use crate::context::RequestContext;

/// Type tag on every approval notification.
pub const APPROVAL_NOTIFICATION_TYPE: &str = "APPROVAL";

/// The prompt shown to every eligible approver until a decision lands.
pub fn approval_requested(request: &ApprovalRequest, ctx: &RequestContext) -> NewNotification {
    NewNotification {
        notification_type: APPROVAL_NOTIFICATION_TYPE.to_string(),
        action: Some(NotificationAction::ApprovalRequested),
        title: format!("Approval requested: {}", request.request_type),
        message: format!(
            "{} requests {} (quantity {})",
            request.requester_username, request.request_type, request.quantity
        ),
        target_module: Some(request.approver_role),
        priority: NotificationPriority::High,
        created_by: request.requester_username.clone(),
        source_device_id: ctx.device_id.clone(),
        source_module: Some(request.requester_module),
        requires_resolution: true,
        related_entity_type: Some(APPROVAL_ENTITY.to_string()),
        related_entity_id: Some(request.id.to_string()),
        metadata: Some(metadata(request)),
        ..Default::default()
    }
}

/// The outcome sent back to the requester's module.
pub fn approval_outcome(request: &ApprovalRequest) -> NewNotification {
    let (action, verb) = match request.status {
        ApprovalStatus::Approved => (NotificationAction::ApprovalApproved, "approved"),
        ApprovalStatus::Rejected => (NotificationAction::ApprovalRejected, "rejected"),
        _ => (NotificationAction::ApprovalTimedOut, "timed out"),
    };
    let by = request.processed_by.as_deref().unwrap_or("system");

    let mut message = match request.status {
        ApprovalStatus::Timeout => format!(
            "Your {} request expired without a decision",
            request.request_type
        ),
        _ => format!("Your {} request was {verb} by {by}", request.request_type),
    };
    if let Some(notes) = request.processing_notes.as_deref().filter(|n| !n.is_empty()) {
        message.push_str(": ");
        message.push_str(notes);
    }

    NewNotification {
        notification_type: APPROVAL_NOTIFICATION_TYPE.to_string(),
        action: Some(action),
        title: format!("Request {verb}: {}", request.request_type),
        message,
        target_module: Some(request.requester_module),
        priority: NotificationPriority::Normal,
        created_by: by.to_string(),
        source_module: Some(request.approver_role),
        related_entity_type: Some(APPROVAL_ENTITY.to_string()),
        related_entity_id: Some(request.id.to_string()),
        metadata: Some(metadata(request)),
        ..Default::default()
    }
}

fn metadata(request: &ApprovalRequest) -> serde_json::Value {
    json!({
        "approvalId": request.id,
        "requestType": request.request_type,
        "requester": request.requester_username,
        "approverRole": request.approver_role,
        "targetApproverId": request.target_approver_id,
        "projectId": request.project_id,
        "itemId": request.item_id,
        "quantity": request.quantity,
        "status": request.status,
        "expiresAt": request.expires_at,
    })
}
