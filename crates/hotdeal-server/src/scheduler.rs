//! Background job scheduler.
//!
//! Registers the recurring collection run and the daily retention cleanup.

use chrono::Utc;
use hotdeal_core::days_before;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::api::AppState;

/// Retention runs daily at 03:00 UTC.
const RETENTION_CRON: &str = "0 0 3 * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(state: AppState) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_collect_job(&scheduler, state.clone()).await?;
    register_retention_job(&scheduler, state).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_collect_job(
    scheduler: &JobScheduler,
    state: AppState,
) -> Result<(), JobSchedulerError> {
    let schedule = state.config.collect_cron.clone();
    tracing::info!(schedule = %schedule, "scheduler: registering collection job");

    let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
        let state = state.clone();

        Box::pin(async move {
            tracing::info!("scheduler: starting collection run");
            if let Some(summary) = state.refresh_deals().await {
                tracing::info!(
                    total_deals = summary.total_deals,
                    failed_sources = summary.failed_sources,
                    "scheduler: collection run complete"
                );
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_retention_job(
    scheduler: &JobScheduler,
    state: AppState,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(RETENTION_CRON, move |_uuid, _lock| {
        let state = state.clone();

        Box::pin(async move {
            let days = state.config.retention_days;
            let Some(cutoff) = days_before(Utc::now(), i64::from(days)) else {
                tracing::error!(
                    days,
                    "scheduler: retention window out of range, skipping cleanup"
                );
                return;
            };
            tracing::info!(cutoff = %cutoff, "scheduler: starting retention cleanup");
            if let Err(e) = state.storage.cleanup_old_data(cutoff).await {
                tracing::error!(error = %e, "scheduler: retention cleanup failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
