//! In-process implementations of the store traits.
//!
//! Used by the test suites and by `database.provider = "memory"` for
//! single-node development. State lives for the lifetime of the process.

pub mod approval;
pub mod device;
pub mod notification;

pub use approval::MemoryApprovalStore;
pub use device::MemoryDeviceStore;
pub use notification::MemoryNotificationStore;
