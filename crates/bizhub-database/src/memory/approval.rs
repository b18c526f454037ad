//! In-memory approval store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use bizhub_core::result::AppResult;
use bizhub_core::types::ApprovalId;
use bizhub_entity::ModuleType;
use bizhub_entity::approval::{ApprovalRequest, ApprovalStatus};

use crate::store::{ApprovalDecision, ApprovalStore};

/// Approval requests held in a lock-guarded map.
#[derive(Debug, Default)]
pub struct MemoryApprovalStore {
    requests: RwLock<HashMap<ApprovalId, ApprovalRequest>>,
}

impl MemoryApprovalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for MemoryApprovalStore {
    async fn insert(&self, request: &ApprovalRequest) -> AppResult<ApprovalRequest> {
        self.requests
            .write()
            .await
            .insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn delete(&self, id: ApprovalId) -> AppResult<bool> {
        Ok(self.requests.write().await.remove(&id).is_some())
    }

    async fn find_by_id(&self, id: ApprovalId) -> AppResult<Option<ApprovalRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn find_pending_for_role(
        &self,
        role: ModuleType,
        user_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ApprovalRequest>> {
        let guard = self.requests.read().await;
        let mut found: Vec<ApprovalRequest> = guard
            .values()
            .filter(|r| {
                r.approver_role == role
                    && r.is_pending()
                    && !r.is_expired_at(now)
                    && (r.target_approver_id.is_none() || r.target_approver_id == user_id)
            })
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_at);
        Ok(found)
    }

    async fn find_by_requester(&self, username: &str) -> AppResult<Vec<ApprovalRequest>> {
        let guard = self.requests.read().await;
        let mut found: Vec<ApprovalRequest> = guard
            .values()
            .filter(|r| r.requester_username == username)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_expired_pending(&self, now: DateTime<Utc>) -> AppResult<Vec<ApprovalRequest>> {
        let guard = self.requests.read().await;
        let mut found: Vec<ApprovalRequest> = guard
            .values()
            .filter(|r| r.is_pending() && r.expires_at < now)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.expires_at);
        Ok(found)
    }

    async fn transition(
        &self,
        id: ApprovalId,
        decision: &ApprovalDecision,
    ) -> AppResult<Option<ApprovalRequest>> {
        let mut guard = self.requests.write().await;
        match guard.get_mut(&id) {
            Some(request) if request.status == ApprovalStatus::Pending => {
                request.status = decision.status;
                request.processed_by = Some(decision.processed_by.clone());
                request.processed_at = Some(decision.processed_at);
                request.processing_notes = decision.processing_notes.clone();
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }
}
