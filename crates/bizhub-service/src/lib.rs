//! # bizhub-service
//!
//! Business logic service layer for BizHub. Each service orchestrates the
//! stores, the fan-out and the presence registry to implement
//! application-level use cases.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod approval;
pub mod context;
pub mod notification;
pub mod presence;

pub use approval::{ApprovalWorkflow, CreateApproval, ExpirySweepReport};
pub use context::RequestContext;
pub use notification::{NotificationService, UnreadCount};
pub use presence::PresenceService;
