//! Approval request domain entities.

pub mod model;
pub mod status;

pub use model::{APPROVAL_GRACE_DAYS, ApprovalRequest, NewApprovalRequest, grace_period};
pub use status::ApprovalStatus;
