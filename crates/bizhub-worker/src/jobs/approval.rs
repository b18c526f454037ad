//! Approval expiry job — times out requests past their deadline.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use bizhub_service::ApprovalWorkflow;

use crate::executor::{JobExecutionError, JobHandler, JobRun};

/// Job type for the hourly expiry sweep
pub const APPROVAL_EXPIRY: &str = "approval_expiry";

/// Drives overdue pending requests to `Timeout`
#[derive(Debug)]
pub struct ApprovalExpiryJobHandler {
    /// Approval workflow
    workflow: Arc<ApprovalWorkflow>,
}

impl ApprovalExpiryJobHandler {
    /// Create a new approval expiry handler
    pub fn new(workflow: Arc<ApprovalWorkflow>) -> Self {
        Self { workflow }
    }
}

#[async_trait]
impl JobHandler for ApprovalExpiryJobHandler {
    fn job_type(&self) -> &str {
        APPROVAL_EXPIRY
    }

    async fn execute(&self, _run: &JobRun) -> Result<Option<Value>, JobExecutionError> {
        tracing::debug!("Running approval expiry sweep");

        let report = self
            .workflow
            .expire_overdue()
            .await
            .map_err(|e| JobExecutionError::from_app("Approval expiry sweep failed", e))?;

        Ok(Some(serde_json::json!({
            "task": APPROVAL_EXPIRY,
            "examined": report.examined,
            "timed_out": report.timed_out,
            "skipped": report.skipped,
            "failed": report.failed,
            "prompts_settled": report.prompts_settled,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizhub_core::config::BrokerConfig;
    use bizhub_core::traits::ManualClock;
    use bizhub_database::StoreBundle;
    use bizhub_entity::ModuleType;
    use bizhub_realtime::Fanout;
    use bizhub_realtime::broker::MemoryBroker;
    use bizhub_service::{CreateApproval, RequestContext};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_sweep_summary_counts_timeouts() {
        let stores = StoreBundle::in_memory();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let fanout = Arc::new(Fanout::new(
            stores.notifications.clone(),
            stores.devices.clone(),
            Arc::new(MemoryBroker::new()),
            clock.clone(),
            &BrokerConfig::default(),
        ));
        let workflow = Arc::new(ApprovalWorkflow::new(
            stores.approvals.clone(),
            fanout,
            clock.clone(),
        ));
        workflow
            .create(
                &RequestContext::new("bob", None, ModuleType::Storage),
                CreateApproval {
                    request_type: "ADD_ELEMENT".to_string(),
                    approver_role: ModuleType::Sales,
                    target_approver_id: None,
                    project_id: None,
                    item_id: None,
                    quantity: 1,
                    notes: None,
                },
            )
            .await
            .unwrap();
        clock.advance(Duration::hours(49));

        let handler = ApprovalExpiryJobHandler::new(workflow);
        let summary = handler
            .execute(&JobRun::new(APPROVAL_EXPIRY, Utc::now()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary["timed_out"], 1);
        assert_eq!(summary["failed"], 0);
    }
}
