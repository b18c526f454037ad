//! Background sweeps for BizHub.
//!
//! This crate provides:
//! - A job executor that dispatches runs to the handler for their type
//! - A cron scheduler that triggers each sweep on its configured schedule
//! - Handlers for approval expiry, notification retention and stale
//!   device detection

pub mod executor;
pub mod jobs;
pub mod scheduler;

pub use executor::{JobExecutionError, JobExecutor, JobHandler, JobRun};
pub use scheduler::CronScheduler;
