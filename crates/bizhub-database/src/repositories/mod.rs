//! PostgreSQL implementations of the store traits.

pub mod approval;
pub mod device;
pub mod notification;

pub use approval::ApprovalRepository;
pub use device::DeviceRepository;
pub use notification::NotificationRepository;
