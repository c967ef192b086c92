//! Scheduled background jobs.

pub mod retention;

pub use retention::RetentionSweeper;

use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::RetentionConfig;
use crate::error::{AppError, Result};
use crate::state::ClusterStore;

/// Start the cron scheduler with the retention sweep registered.
///
/// The returned scheduler owns the job; dropping it stops future runs.
pub async fn start_scheduler(
    store: Arc<dyn ClusterStore>,
    config: &RetentionConfig,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| AppError::Scheduler(e.to_string()))?;

    let sweeper = Arc::new(RetentionSweeper::new(store, config.retention_days));
    let job = Job::new_async(config.schedule.as_str(), move |_uuid, _lock| {
        let sweeper = Arc::clone(&sweeper);
        Box::pin(async move {
            if let Err(e) = sweeper.sweep().await {
                tracing::error!(error = %e, "Retention sweep failed");
            }
        })
    })
    .map_err(|e| AppError::Scheduler(e.to_string()))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| AppError::Scheduler(e.to_string()))?;
    scheduler
        .start()
        .await
        .map_err(|e| AppError::Scheduler(e.to_string()))?;

    tracing::info!(schedule = %config.schedule, "Retention scheduler started");
    Ok(scheduler)
}
