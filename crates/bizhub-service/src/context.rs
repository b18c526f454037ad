//! Request context carrying the acting user, their module role and device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bizhub_entity::ModuleType;

/// Who is acting, as asserted by the upstream gateway.
///
/// Passed into service methods so that every operation knows *who* is
/// acting and from *which* device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The acting username.
    pub username: String,
    /// The acting user's numeric id, when the gateway knows it.
    pub user_id: Option<i64>,
    /// The module role the user acts in.
    pub role: ModuleType,
    /// The device the request came from.
    pub device_id: Option<String>,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(username: impl Into<String>, user_id: Option<i64>, role: ModuleType) -> Self {
        Self {
            username: username.into(),
            user_id,
            role,
            device_id: None,
            request_time: Utc::now(),
        }
    }

    /// Attach the originating device.
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Returns whether the user acts in `role`.
    pub fn holds_role(&self, role: ModuleType) -> bool {
        self.role == role
    }
}
