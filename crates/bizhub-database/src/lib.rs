//! # bizhub-database
//!
//! Persistence for BizHub. The [`store`] module defines the storage traits
//! the rest of the workspace depends on; [`repositories`] implements them on
//! PostgreSQL and [`memory`] implements them in-process for tests and
//! single-node development.

pub mod bundle;
pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use bundle::StoreBundle;
pub use connection::DatabasePool;
pub use store::{
    ApprovalDecision, ApprovalStore, DeviceStore, DeviceUpsert, NotificationStore, ReadScope,
};
