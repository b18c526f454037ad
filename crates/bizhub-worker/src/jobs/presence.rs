//! Stale device job — marks devices that stopped heartbeating offline.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use bizhub_realtime::PresenceRegistry;

use crate::executor::{JobExecutionError, JobHandler, JobRun};

/// Job type for the stale device sweep
pub const STALE_DEVICE_SWEEP: &str = "stale_device_sweep";

/// Handles stale device detection
#[derive(Debug)]
pub struct StaleDeviceJobHandler {
    /// Presence registry
    registry: Arc<PresenceRegistry>,
}

impl StaleDeviceJobHandler {
    /// Create a new stale device handler
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl JobHandler for StaleDeviceJobHandler {
    fn job_type(&self) -> &str {
        STALE_DEVICE_SWEEP
    }

    async fn execute(&self, _run: &JobRun) -> Result<Option<Value>, JobExecutionError> {
        let threshold = self.registry.stale_threshold();
        tracing::debug!(threshold_seconds = threshold.num_seconds(), "Running stale device sweep");

        let report = self
            .registry
            .stale_sweep(threshold)
            .await
            .map_err(|e| JobExecutionError::from_app("Stale device sweep failed", e))?;

        Ok(Some(serde_json::json!({
            "task": STALE_DEVICE_SWEEP,
            "examined": report.examined,
            "marked_offline": report.marked_offline,
            "refreshed": report.refreshed,
            "failed": report.failed,
            "threshold_seconds": threshold.num_seconds(),
        })))
    }
}
