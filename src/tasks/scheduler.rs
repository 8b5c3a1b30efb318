use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

pub type SweepCallback = Arc<dyn Fn() + Send + Sync>;

/// Registers the periodic page-wide link sweep and starts the scheduler.
pub async fn configure_link_sweep(cron_spec: &str, callback: SweepCallback) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let label = cron_spec.to_string();
    let job = Job::new_async(cron_spec, move |_id, _l| {
        let cb = callback.clone();
        let cron_label = label.clone();
        Box::pin(async move {
            tracing::debug!(target: "scheduler", cron = %cron_label, "link sweep triggered");
            cb();
        })
    })?;
    scheduler.add(job).await?;
    tracing::info!(target: "scheduler", cron = %cron_spec, "link sweep registered");
    scheduler.start().await?;
    Ok(scheduler)
}
