//! # bizhub-entity
//!
//! Domain entity models for BizHub. Every struct in this crate represents a
//! database table row or a domain value object. All entities derive `Debug`,
//! `Clone`, `Serialize`, `Deserialize`, and database entities additionally
//! derive `sqlx::FromRow`.

pub mod approval;
pub mod device;
pub mod module;
pub mod notification;

pub use module::ModuleType;
