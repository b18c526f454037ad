//! Notification publishing and client queries.

pub mod service;

pub use service::{NotificationService, UnreadCount};
