//! Notification retention and client delivery configuration.

use serde::{Deserialize, Serialize};

/// Notification lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Rows older than this many months are deleted by the retention sweep.
    #[serde(default = "default_retention_months")]
    pub retention_months: u32,
    /// Keep unresolved approval prompts regardless of age.
    #[serde(default = "default_true")]
    pub exempt_unresolved_approvals: bool,
    /// Seconds before a shown client notification is dismissed (0 disables).
    #[serde(default = "default_auto_dismiss")]
    pub auto_dismiss_seconds: u64,
    /// Number of recently seen notification ids a client remembers.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Seconds a client looks back past its newest delivered notification
    /// when it catches up after a reconnect. Must exceed the longest
    /// publish retry span.
    #[serde(default = "default_replay_window")]
    pub replay_window_seconds: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            retention_months: default_retention_months(),
            exempt_unresolved_approvals: default_true(),
            auto_dismiss_seconds: default_auto_dismiss(),
            dedup_capacity: default_dedup_capacity(),
            replay_window_seconds: default_replay_window(),
        }
    }
}

fn default_retention_months() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_auto_dismiss() -> u64 {
    10
}

fn default_dedup_capacity() -> usize {
    1000
}

fn default_replay_window() -> u64 {
    300
}
