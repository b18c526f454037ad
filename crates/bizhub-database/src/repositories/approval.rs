//! Approval request repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bizhub_core::error::{AppError, ErrorKind};
use bizhub_core::result::AppResult;
use bizhub_core::types::ApprovalId;
use bizhub_entity::ModuleType;
use bizhub_entity::approval::ApprovalRequest;

use crate::store::{ApprovalDecision, ApprovalStore};

/// Repository for the `approval_requests` table.
#[derive(Debug, Clone)]
pub struct ApprovalRepository {
    pool: PgPool,
}

impl ApprovalRepository {
    /// Create a new approval repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApprovalStore for ApprovalRepository {
    async fn insert(&self, request: &ApprovalRequest) -> AppResult<ApprovalRequest> {
        sqlx::query_as::<_, ApprovalRequest>(
            "INSERT INTO approval_requests (id, request_type, requester_username, requester_user_id, \
             requester_module, approver_role, target_approver_id, project_id, item_id, quantity, \
             notes, status, created_at, expires_at, processed_at, processed_by, processing_notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING *",
        )
        .bind(request.id)
        .bind(&request.request_type)
        .bind(&request.requester_username)
        .bind(request.requester_user_id)
        .bind(request.requester_module)
        .bind(request.approver_role)
        .bind(request.target_approver_id)
        .bind(request.project_id)
        .bind(request.item_id)
        .bind(request.quantity)
        .bind(&request.notes)
        .bind(request.status)
        .bind(request.created_at)
        .bind(request.expires_at)
        .bind(request.processed_at)
        .bind(&request.processed_by)
        .bind(&request.processing_notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::PersistenceFailure,
                "Failed to insert approval request",
                e,
            )
        })
    }

    async fn delete(&self, id: ApprovalId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM approval_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::PersistenceFailure,
                    "Failed to delete approval request",
                    e,
                )
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: ApprovalId) -> AppResult<Option<ApprovalRequest>> {
        sqlx::query_as::<_, ApprovalRequest>("SELECT * FROM approval_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::PersistenceFailure,
                    "Failed to find approval request",
                    e,
                )
            })
    }

    async fn find_pending_for_role(
        &self,
        role: ModuleType,
        user_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ApprovalRequest>> {
        sqlx::query_as::<_, ApprovalRequest>(
            "SELECT * FROM approval_requests \
             WHERE approver_role = $1 AND status = 'pending' AND expires_at >= $3 \
             AND (target_approver_id IS NULL OR target_approver_id = $2) \
             ORDER BY created_at ASC",
        )
        .bind(role)
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::PersistenceFailure,
                "Failed to list pending approvals",
                e,
            )
        })
    }

    async fn find_by_requester(&self, username: &str) -> AppResult<Vec<ApprovalRequest>> {
        sqlx::query_as::<_, ApprovalRequest>(
            "SELECT * FROM approval_requests WHERE requester_username = $1 \
             ORDER BY created_at DESC",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::PersistenceFailure,
                "Failed to list approvals by requester",
                e,
            )
        })
    }

    async fn find_expired_pending(&self, now: DateTime<Utc>) -> AppResult<Vec<ApprovalRequest>> {
        sqlx::query_as::<_, ApprovalRequest>(
            "SELECT * FROM approval_requests WHERE status = 'pending' AND expires_at < $1 \
             ORDER BY expires_at ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::PersistenceFailure,
                "Failed to find expired approvals",
                e,
            )
        })
    }

    async fn transition(
        &self,
        id: ApprovalId,
        decision: &ApprovalDecision,
    ) -> AppResult<Option<ApprovalRequest>> {
        sqlx::query_as::<_, ApprovalRequest>(
            "UPDATE approval_requests \
             SET status = $2, processed_by = $3, processed_at = $4, processing_notes = $5 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING *",
        )
        .bind(id)
        .bind(decision.status)
        .bind(&decision.processed_by)
        .bind(decision.processed_at)
        .bind(&decision.processing_notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::PersistenceFailure,
                "Failed to update approval status",
                e,
            )
        })
    }
}
