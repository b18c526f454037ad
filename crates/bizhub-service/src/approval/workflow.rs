//! Approval request state machine: create, decide, expire.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use bizhub_core::error::AppError;
use bizhub_core::result::AppResult;
use bizhub_core::traits::Clock;
use bizhub_core::types::ApprovalId;
use bizhub_database::store::{ApprovalDecision, ApprovalStore};
use bizhub_entity::ModuleType;
use bizhub_entity::approval::{ApprovalRequest, ApprovalStatus, NewApprovalRequest};
use bizhub_entity::notification::{APPROVAL_ENTITY, NotificationAction};
use bizhub_realtime::Fanout;

use super::messages;
use crate::context::RequestContext;

/// Username recorded on requests that time out.
pub const SYSTEM_ACTOR: &str = "system";

/// What a requester asks for. The requester is taken from the context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApproval {
    /// Free-form request type tag, e.g. `ADD_ELEMENT`.
    pub request_type: String,
    /// Role whose holders decide.
    pub approver_role: ModuleType,
    /// Restrict the decision to one user.
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

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpirySweepReport {
    /// Overdue requests found.
    pub examined: usize,
    /// Requests moved to `Timeout`.
    pub timed_out: usize,
    /// Requests decided by someone else mid-sweep.
    pub skipped: usize,
    /// Requests whose update failed.
    pub failed: usize,
    /// Open prompts resolved because their request was already decided.
    pub prompts_settled: usize,
}

/// Drives approval requests from `Pending` to a terminal state.
///
/// Every transition out of `Pending` is a compare-and-set in the store, so
/// of any number of concurrent decisions exactly one succeeds.
#[derive(Clone)]
pub struct ApprovalWorkflow {
    approvals: Arc<dyn ApprovalStore>,
    fanout: Arc<Fanout>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ApprovalWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalWorkflow")
            .field("fanout", &self.fanout)
            .finish()
    }
}

impl ApprovalWorkflow {
    /// Creates a new approval workflow.
    pub fn new(approvals: Arc<dyn ApprovalStore>, fanout: Arc<Fanout>, clock: Arc<dyn Clock>) -> Self {
        Self {
            approvals,
            fanout,
            clock,
        }
    }

    /// Open a request and prompt the approver role.
    ///
    /// The request only stands if its prompt was stored; otherwise it is
    /// removed again and the storage error is returned.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: CreateApproval,
    ) -> AppResult<ApprovalRequest> {
        let request_type = input.request_type.trim();
        if request_type.is_empty() {
            return Err(AppError::validation("Request type must not be empty"));
        }
        if input.quantity < 0 {
            return Err(AppError::validation("Quantity must not be negative"));
        }

        let request = ApprovalRequest::new(
            NewApprovalRequest {
                request_type: request_type.to_string(),
                requester_username: ctx.username.clone(),
                requester_user_id: ctx.user_id,
                requester_module: ctx.role,
                approver_role: input.approver_role,
                target_approver_id: input.target_approver_id,
                project_id: input.project_id,
                item_id: input.item_id,
                quantity: input.quantity,
                notes: input.notes,
            },
            self.clock.now(),
        );
        let request = self.approvals.insert(&request).await?;

        if let Err(e) = self
            .fanout
            .publish(messages::approval_requested(&request, ctx))
            .await
        {
            error!(approval_id = %request.id, error = %e, "Failed to record approval prompt");
            if let Err(cleanup) = self.approvals.delete(request.id).await {
                error!(
                    approval_id = %request.id,
                    error = %cleanup,
                    "Failed to remove approval request without prompt"
                );
            }
            return Err(e);
        }

        info!(
            approval_id = %request.id,
            request_type = %request.request_type,
            requester = %request.requester_username,
            approver_role = %request.approver_role,
            expires_at = %request.expires_at,
            "Approval requested"
        );
        Ok(request)
    }

    /// Approve a pending request.
    pub async fn approve(
        &self,
        ctx: &RequestContext,
        id: ApprovalId,
        notes: Option<String>,
    ) -> AppResult<ApprovalRequest> {
        self.decide(ctx, id, ApprovalStatus::Approved, notes).await
    }

    /// Reject a pending request.
    pub async fn reject(
        &self,
        ctx: &RequestContext,
        id: ApprovalId,
        reason: Option<String>,
    ) -> AppResult<ApprovalRequest> {
        self.decide(ctx, id, ApprovalStatus::Rejected, reason).await
    }

    /// Look up a request.
    pub async fn get(&self, id: ApprovalId) -> AppResult<ApprovalRequest> {
        self.approvals
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Approval request {id} not found")))
    }

    /// Requests the caller may decide right now.
    pub async fn list_pending_for_role(
        &self,
        ctx: &RequestContext,
        role: ModuleType,
    ) -> AppResult<Vec<ApprovalRequest>> {
        if !ctx.holds_role(role) {
            return Err(AppError::authorization(format!(
                "Role {} cannot view approvals for {role}",
                ctx.role
            )));
        }
        self.approvals
            .find_pending_for_role(role, ctx.user_id, self.clock.now())
            .await
    }

    /// Requests made by `username`, newest first.
    pub async fn list_by_requester(&self, username: &str) -> AppResult<Vec<ApprovalRequest>> {
        self.approvals.find_by_requester(username).await
    }

    /// Time out every overdue request, then resolve prompts still open for
    /// requests that are no longer pending. Failures are isolated per item.
    pub async fn expire_overdue(&self) -> AppResult<ExpirySweepReport> {
        let overdue = self.approvals.find_expired_pending(self.clock.now()).await?;
        let mut report = ExpirySweepReport {
            examined: overdue.len(),
            ..Default::default()
        };

        for request in overdue {
            match self.time_out(&request).await {
                Ok(Some(_)) => report.timed_out += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(approval_id = %request.id, error = %e, "Failed to time out approval");
                }
            }
        }

        report.prompts_settled = self.settle_stale_prompts().await?;

        info!(
            examined = report.examined,
            timed_out = report.timed_out,
            skipped = report.skipped,
            failed = report.failed,
            prompts_settled = report.prompts_settled,
            "Approval expiry sweep complete"
        );
        Ok(report)
    }

    async fn decide(
        &self,
        ctx: &RequestContext,
        id: ApprovalId,
        status: ApprovalStatus,
        notes: Option<String>,
    ) -> AppResult<ApprovalRequest> {
        let request = self.get(id).await?;
        if !request.is_pending() {
            return Err(already_processed(&request));
        }
        authorize(ctx, &request)?;

        let now = self.clock.now();
        if request.is_expired_at(now) {
            return match self.time_out(&request).await? {
                Some(_) => Err(AppError::expired(format!(
                    "Approval request {id} expired at {}",
                    request.expires_at
                ))),
                None => Err(self.lost_race(id).await),
            };
        }

        let decision = ApprovalDecision {
            status,
            processed_by: ctx.username.clone(),
            processed_at: now,
            processing_notes: notes,
        };
        let Some(decided) = self.approvals.transition(id, &decision).await? else {
            return Err(self.lost_race(id).await);
        };

        info!(
            approval_id = %decided.id,
            status = %decided.status,
            processed_by = %ctx.username,
            "Approval decided"
        );
        self.announce(&decided).await;
        Ok(decided)
    }

    /// CAS to `Timeout`. `None` when the request already left `Pending`.
    async fn time_out(&self, request: &ApprovalRequest) -> AppResult<Option<ApprovalRequest>> {
        let decision = ApprovalDecision {
            status: ApprovalStatus::Timeout,
            processed_by: SYSTEM_ACTOR.to_string(),
            processed_at: self.clock.now(),
            processing_notes: None,
        };
        let Some(expired) = self.approvals.transition(request.id, &decision).await? else {
            return Ok(None);
        };

        info!(
            approval_id = %expired.id,
            expires_at = %expired.expires_at,
            "Approval timed out"
        );
        self.announce(&expired).await;
        Ok(Some(expired))
    }

    /// Notify the requester and retire the prompt. The decision is already
    /// committed, so failures here are logged; a prompt left open is
    /// resolved by the next expiry sweep.
    async fn announce(&self, request: &ApprovalRequest) {
        if let Err(e) = self.fanout.publish(messages::approval_outcome(request)).await {
            warn!(approval_id = %request.id, error = %e, "Failed to notify requester");
        }

        let entity_id = request.id.to_string();
        match self
            .fanout
            .store()
            .resolve_for_entity(APPROVAL_ENTITY, &entity_id)
            .await
        {
            Ok(resolved) => {
                self.fanout
                    .publish_resolution(Some(request.approver_role), APPROVAL_ENTITY, &entity_id)
                    .await;
                info!(approval_id = %request.id, resolved, "Approval prompt resolved");
            }
            Err(e) => {
                warn!(approval_id = %request.id, error = %e, "Failed to resolve approval prompt");
            }
        }
    }

    /// Resolve open prompts whose request is gone or no longer pending.
    async fn settle_stale_prompts(&self) -> AppResult<usize> {
        let store = self.fanout.store();
        let open = store
            .unresolved_by_action(NotificationAction::ApprovalRequested, None)
            .await?;

        let mut settled = 0;
        for prompt in open {
            if prompt.related_entity_type.as_deref() != Some(APPROVAL_ENTITY) {
                continue;
            }
            let Some(entity_id) = prompt.related_entity_id.as_deref() else {
                continue;
            };
            let pending = match entity_id.parse::<ApprovalId>() {
                Ok(id) => match self.approvals.find_by_id(id).await {
                    Ok(found) => found.is_some_and(|r| r.is_pending()),
                    Err(e) => {
                        warn!(entity_id, error = %e, "Failed to check approval for open prompt");
                        continue;
                    }
                },
                Err(_) => false,
            };
            if pending {
                continue;
            }

            match store.resolve_for_entity(APPROVAL_ENTITY, entity_id).await {
                Ok(0) => {}
                Ok(_) => {
                    self.fanout
                        .publish_resolution(prompt.target_module, APPROVAL_ENTITY, entity_id)
                        .await;
                    info!(entity_id, "Stale approval prompt resolved");
                    settled += 1;
                }
                Err(e) => warn!(entity_id, error = %e, "Failed to resolve stale prompt"),
            }
        }
        Ok(settled)
    }

    async fn lost_race(&self, id: ApprovalId) -> AppError {
        match self.approvals.find_by_id(id).await {
            Ok(Some(current)) => already_processed(&current),
            Ok(None) => AppError::not_found(format!("Approval request {id} not found")),
            Err(e) => e,
        }
    }
}

fn already_processed(request: &ApprovalRequest) -> AppError {
    AppError::already_processed(format!(
        "Approval request {} is already {}",
        request.id, request.status
    ))
}

fn authorize(ctx: &RequestContext, request: &ApprovalRequest) -> AppResult<()> {
    if !ctx.holds_role(request.approver_role) {
        return Err(AppError::authorization(format!(
            "Only {} may decide this request",
            request.approver_role
        )));
    }
    if !request.accepts_approver(ctx.user_id) {
        return Err(AppError::authorization(
            "This request is targeted at a different approver",
        ));
    }
    Ok(())
}
