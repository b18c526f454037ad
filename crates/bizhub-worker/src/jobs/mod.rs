//! Built-in job handler implementations.

pub mod approval;
pub mod notification;
pub mod presence;

pub use approval::ApprovalExpiryJobHandler;
pub use notification::NotificationRetentionJobHandler;
pub use presence::StaleDeviceJobHandler;
