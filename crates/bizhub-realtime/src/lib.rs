//! # bizhub-realtime
//!
//! Delivery plumbing for BizHub:
//!
//! - Broker providers (in-memory and Redis pub/sub) behind
//!   [`MessageBroker`](bizhub_core::traits::MessageBroker)
//! - Module and broadcast channels
//! - Persist-then-publish fan-out with bounded retries
//! - Device presence registry with stale sweeps
//! - Catch-up reconciliation for reconnecting clients
//! - The client runtime: receive filter, de-duplication, heartbeats and
//!   auto-dismiss

pub mod broker;
pub mod channel;
pub mod client;
pub mod fanout;
pub mod message;
pub mod presence;
pub mod reconciler;

pub use broker::connect_broker;
pub use channel::ChannelType;
pub use fanout::Fanout;
pub use message::{NotificationEvent, WireMessage};
pub use presence::PresenceRegistry;
pub use reconciler::CatchUpReconciler;
