//! Events surfaced to the client UI.

use chrono::{DateTime, Utc};

use bizhub_core::types::NotificationId;

use crate::message::NotificationEvent;

/// How a notification reached the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Received from a subscribed channel.
    Live,
    /// Replayed by catch-up.
    Replay,
}

/// Everything the client runtime emits.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Show a notification.
    Notification {
        /// The notification.
        event: NotificationEvent,
        /// Live or replayed.
        origin: Origin,
    },
    /// Drop any prompt still shown for this entity.
    Resolved {
        /// Entity kind.
        entity_type: String,
        /// Entity id.
        entity_id: String,
        /// When it was resolved.
        at: DateTime<Utc>,
    },
    /// Hide a notification whose display time ran out.
    Dismissed(NotificationId),
}
