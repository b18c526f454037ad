//! Core type definitions used across the BizHub workspace.

pub mod id;

pub use id::*;
