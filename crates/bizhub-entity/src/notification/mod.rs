//! Notification domain entities.

pub mod action;
pub mod model;
pub mod priority;
pub mod receipt;

pub use action::NotificationAction;
pub use model::{APPROVAL_ENTITY, NewNotification, Notification};
pub use priority::NotificationPriority;
pub use receipt::NotificationReceipt;
