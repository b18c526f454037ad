//! Device presence on behalf of a request context.

pub mod service;

pub use service::PresenceService;
