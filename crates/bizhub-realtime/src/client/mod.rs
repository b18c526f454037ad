//! Client-side runtime for desktop processes.
//!
//! A client subscribes to the channels of its module, filters and
//! de-duplicates what arrives, replays what it missed on (re)connect and
//! keeps its presence alive with periodic heartbeats. Everything it shows
//! comes out of a single [`ClientEvent`] receiver.

pub mod dismiss;
pub mod event;
pub mod heartbeat;
pub mod inbound;
pub mod runtime;
pub mod source;

pub use dismiss::AutoDismissScheduler;
pub use event::{ClientEvent, Origin};
pub use heartbeat::spawn_heartbeat;
pub use inbound::{InboundRouter, Verdict};
pub use runtime::{ClientConfig, ClientRuntime};
pub use source::{CatchUpSource, HeartbeatSink};
