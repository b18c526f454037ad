//! Job executor — dispatches runs to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use bizhub_core::error::AppError;

/// One triggered execution of a job type.
#[derive(Debug, Clone)]
pub struct JobRun {
    /// Handler to dispatch to
    pub job_type: String,
    /// When the trigger fired
    pub triggered_at: DateTime<Utc>,
}

impl JobRun {
    /// Create a run for `job_type` triggered at `triggered_at`
    pub fn new(job_type: impl Into<String>, triggered_at: DateTime<Utc>) -> Self {
        Self {
            job_type: job_type.into(),
            triggered_at,
        }
    }
}

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Get the job type this handler processes
    fn job_type(&self) -> &str;

    /// Execute the job, returning a JSON summary
    async fn execute(&self, run: &JobRun) -> Result<Option<Value>, JobExecutionError>;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure — do not retry
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure — the next tick will try again
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Classify a service error: persistence and broker failures are transient.
    pub fn from_app(context: &str, error: AppError) -> Self {
        if error.is_transient() {
            Self::Transient(format!("{context}: {error}"))
        } else {
            Self::Internal(error)
        }
    }
}

/// Dispatches runs to the appropriate handler based on job_type
#[derive(Debug, Default)]
pub struct JobExecutor {
    /// Registered job handlers by type
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// Create a new job executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job handler
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().to_string();
        tracing::info!(job_type = %job_type, "Registered job handler");
        self.handlers.insert(job_type, handler);
    }

    /// Execute a run by dispatching to the correct handler
    pub async fn execute(&self, run: &JobRun) -> Result<Option<Value>, JobExecutionError> {
        let handler = self.handlers.get(&run.job_type).ok_or_else(|| {
            JobExecutionError::Permanent(format!(
                "No handler registered for job type '{}'",
                run.job_type
            ))
        })?;

        tracing::debug!(
            job_type = %run.job_type,
            triggered_at = %run.triggered_at,
            "Executing job"
        );

        handler.execute(run).await
    }

    /// Check if a handler is registered for a job type
    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Get the list of registered job types
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}
