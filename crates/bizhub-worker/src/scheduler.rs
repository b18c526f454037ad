//! Cron scheduler for the periodic sweeps.

use std::sync::Arc;

use serde_json::Value;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use bizhub_core::config::WorkerConfig;
use bizhub_core::error::AppError;
use bizhub_core::traits::Clock;

use crate::executor::{JobExecutionError, JobExecutor, JobRun};
use crate::jobs::approval::APPROVAL_EXPIRY;
use crate::jobs::notification::NOTIFICATION_RETENTION;
use crate::jobs::presence::STALE_DEVICE_SWEEP;

/// Cron-based scheduler that hands each tick to the job executor
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Executor the ticks dispatch to
    executor: Arc<JobExecutor>,
    /// Stamps each run
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("job_types", &self.executor.registered_types())
            .finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(executor: Arc<JobExecutor>, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self {
            scheduler,
            executor,
            clock,
        })
    }

    /// Register the expiry, retention and stale device sweeps
    pub async fn register_default_tasks(&self, config: &WorkerConfig) -> Result<(), AppError> {
        self.register(APPROVAL_EXPIRY, &config.expiry_sweep_cron).await?;
        self.register(NOTIFICATION_RETENTION, &config.retention_sweep_cron)
            .await?;
        self.register(STALE_DEVICE_SWEEP, &config.stale_device_sweep_cron)
            .await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Run `job_type` on the cron expression `schedule`
    pub async fn register(&self, job_type: &str, schedule: &str) -> Result<(), AppError> {
        if !self.executor.has_handler(job_type) {
            return Err(AppError::configuration(format!(
                "No handler registered for scheduled job '{job_type}'"
            )));
        }

        let executor = Arc::clone(&self.executor);
        let clock = Arc::clone(&self.clock);
        let name = job_type.to_string();
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let executor = Arc::clone(&executor);
            let run = JobRun::new(name.clone(), clock.now());
            Box::pin(async move {
                if let Err(e) = dispatch(&executor, &run).await {
                    tracing::error!(job_type = %run.job_type, error = %e, "Scheduled job failed");
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid schedule '{schedule}' for {job_type}: {e}"
            ))
        })?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {job_type} schedule: {e}")))?;

        tracing::info!(job_type, schedule, "Registered scheduled job");
        Ok(())
    }

    /// Run a job immediately, outside its schedule
    pub async fn trigger(&self, job_type: &str) -> Result<Option<Value>, JobExecutionError> {
        dispatch(&self.executor, &JobRun::new(job_type, self.clock.now())).await
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}

async fn dispatch(executor: &JobExecutor, run: &JobRun) -> Result<Option<Value>, JobExecutionError> {
    let summary = executor.execute(run).await?;
    match &summary {
        Some(summary) => tracing::info!(job_type = %run.job_type, %summary, "Job completed"),
        None => tracing::info!(job_type = %run.job_type, "Job completed"),
    }
    Ok(summary)
}
