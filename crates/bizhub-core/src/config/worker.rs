//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Cron schedules for the periodic sweeps.
///
/// Expressions use the six-field form accepted by `tokio-cron-scheduler`
/// (`sec min hour day-of-month month day-of-week`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the scheduler is started at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Approval expiry sweep schedule.
    #[serde(default = "default_expiry_cron")]
    pub expiry_sweep_cron: String,
    /// Notification retention sweep schedule.
    #[serde(default = "default_retention_cron")]
    pub retention_sweep_cron: String,
    /// Stale device sweep schedule.
    #[serde(default = "default_stale_cron")]
    pub stale_device_sweep_cron: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            expiry_sweep_cron: default_expiry_cron(),
            retention_sweep_cron: default_retention_cron(),
            stale_device_sweep_cron: default_stale_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_expiry_cron() -> String {
    "0 0 * * * *".to_string()
}

fn default_retention_cron() -> String {
    "0 0 2 * * *".to_string()
}

fn default_stale_cron() -> String {
    "0 */5 * * * *".to_string()
}
