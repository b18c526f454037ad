//! Approval handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use uuid::Uuid;

use bizhub_core::types::ApprovalId;
use bizhub_entity::approval::ApprovalRequest;

use crate::dto::request::{CreateApprovalRequest, DecisionRequest, PendingQuery, validated};
use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::Actor;
use crate::handlers::{ApiResult, ok};
use crate::state::AppState;

/// POST /api/approvals
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateApprovalRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ApprovalRequest>>), ApiError> {
    let input = validated(req)?.into_input()?;
    let request = state.approvals.create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(request))))
}

/// GET /api/approvals/{id}
pub async fn get(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ApprovalRequest> {
    ok(state.approvals.get(ApprovalId::from_uuid(id)).await?)
}

/// GET /api/approvals/pending
pub async fn pending(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Vec<ApprovalRequest>> {
    let role = query.role()?.unwrap_or(actor.role);
    ok(state.approvals.list_pending_for_role(&actor, role).await?)
}

/// GET /api/approvals/mine
pub async fn mine(State(state): State<AppState>, actor: Actor) -> ApiResult<Vec<ApprovalRequest>> {
    ok(state.approvals.list_by_requester(&actor.username).await?)
}

/// POST /api/approvals/{id}/approve
pub async fn approve(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<ApprovalRequest> {
    let req = validated(req)?;
    ok(state
        .approvals
        .approve(&actor, ApprovalId::from_uuid(id), req.notes)
        .await?)
}

/// POST /api/approvals/{id}/reject
pub async fn reject(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<ApprovalRequest> {
    let req = validated(req)?;
    ok(state
        .approvals
        .reject(&actor, ApprovalId::from_uuid(id), req.notes)
        .await?)
}
