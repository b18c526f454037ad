//! Server collaborators of a client runtime.
//!
//! In-process clients use the presence registry and the catch-up
//! reconciler directly; remote clients can put an HTTP client behind the
//! same traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bizhub_core::result::AppResult;
use bizhub_entity::ModuleType;

use crate::message::NotificationEvent;

/// Receives a client's heartbeats.
#[async_trait]
pub trait HeartbeatSink: Send + Sync + 'static {
    /// Record that `device_id` is alive.
    async fn beat(&self, device_id: &str) -> AppResult<()>;
}

/// Answers what a client missed.
#[async_trait]
pub trait CatchUpSource: Send + Sync + 'static {
    /// Notifications `device_id` missed. `since` defaults to the device's
    /// own last-seen anchor.
    async fn missed(
        &self,
        device_id: &str,
        module: ModuleType,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<NotificationEvent>>;
}
