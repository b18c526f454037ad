//! Presence configuration.

use serde::{Deserialize, Serialize};

/// Heartbeat cadence and staleness detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Seconds between client heartbeats.
    #[serde(default = "default_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Missed heartbeats before a device is considered offline.
    #[serde(default = "default_missed")]
    pub missed_heartbeats: u32,
}

impl PresenceConfig {
    /// Age after which a device with no heartbeat is marked offline.
    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(
            self.heartbeat_interval_seconds as i64 * i64::from(self.missed_heartbeats),
        )
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_interval(),
            missed_heartbeats: default_missed(),
        }
    }
}

fn default_interval() -> u64 {
    60
}

fn default_missed() -> u32 {
    3
}
