//! # bizhub-core
//!
//! Core crate for the BizHub coordination service. Contains the unified
//! error system, configuration schemas, typed identifiers, the clock
//! abstraction, and the message broker trait.
//!
//! This crate has **no** internal dependencies on other BizHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
