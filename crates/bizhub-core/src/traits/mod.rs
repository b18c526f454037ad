//! Core traits defined in `bizhub-core` and implemented by other crates.

pub mod broker;
pub mod clock;

pub use broker::{BrokerMessage, MessageBroker};
pub use clock::{Clock, ManualClock, SystemClock};
