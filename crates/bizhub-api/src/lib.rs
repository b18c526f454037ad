//! # bizhub-api
//!
//! HTTP API layer for BizHub built on Axum.
//!
//! Provides the approval, notification and presence endpoints, the
//! gateway-header actor extractor, request logging and CORS middleware,
//! DTOs and error mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::build_app;
pub use state::AppState;
