//! Cross-module approval requests.

pub mod messages;
pub mod workflow;

pub use workflow::{ApprovalWorkflow, CreateApproval, ExpirySweepReport};
