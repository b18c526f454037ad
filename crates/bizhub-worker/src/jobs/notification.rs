//! Notification retention job — hard-deletes old rows.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use serde_json::Value;

use bizhub_core::config::NotificationsConfig;
use bizhub_core::traits::Clock;
use bizhub_database::store::NotificationStore;

use crate::executor::{JobExecutionError, JobHandler, JobRun};

/// Job type for the daily retention sweep
pub const NOTIFICATION_RETENTION: &str = "notification_retention";

/// Handles notification retention
pub struct NotificationRetentionJobHandler {
    /// Notification store
    store: Arc<dyn NotificationStore>,
    /// Time source for the cutoff
    clock: Arc<dyn Clock>,
    /// Age in months before deletion
    retention_months: u32,
    /// Keep unresolved approval prompts regardless of age
    keep_unresolved: bool,
}

impl std::fmt::Debug for NotificationRetentionJobHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRetentionJobHandler")
            .field("retention_months", &self.retention_months)
            .field("keep_unresolved", &self.keep_unresolved)
            .finish()
    }
}

impl NotificationRetentionJobHandler {
    /// Create a new retention handler
    pub fn new(
        store: Arc<dyn NotificationStore>,
        clock: Arc<dyn Clock>,
        config: &NotificationsConfig,
    ) -> Self {
        Self {
            store,
            clock,
            retention_months: config.retention_months,
            keep_unresolved: config.exempt_unresolved_approvals,
        }
    }

    /// Rows created before this instant are deleted
    pub fn cutoff(&self) -> Result<DateTime<Utc>, JobExecutionError> {
        self.clock
            .now()
            .checked_sub_months(Months::new(self.retention_months))
            .ok_or_else(|| {
                JobExecutionError::Permanent(format!(
                    "Retention of {} months is out of range",
                    self.retention_months
                ))
            })
    }
}

#[async_trait]
impl JobHandler for NotificationRetentionJobHandler {
    fn job_type(&self) -> &str {
        NOTIFICATION_RETENTION
    }

    async fn execute(&self, _run: &JobRun) -> Result<Option<Value>, JobExecutionError> {
        let cutoff = self.cutoff()?;
        tracing::info!(
            retention_months = self.retention_months,
            cutoff = %cutoff,
            "Running notification retention sweep"
        );

        let deleted = self
            .store
            .delete_older_than(cutoff, self.keep_unresolved)
            .await
            .map_err(|e| JobExecutionError::from_app("Notification retention failed", e))?;

        if deleted > 0 {
            tracing::info!(deleted, "Old notifications deleted");
        }

        Ok(Some(serde_json::json!({
            "task": NOTIFICATION_RETENTION,
            "deleted": deleted,
            "cutoff": cutoff,
            "kept_unresolved_approvals": self.keep_unresolved,
        })))
    }
}
