//! Daily completion sweep for past reservations

use anyhow::Result;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::ledger::ReservationLedger;

/// Start the recurring job that marks past active reservations completed
pub async fn start_sweep_job(ledger: ReservationLedger, schedule: &str) -> Result<()> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let ledger = ledger.clone();
        Box::pin(async move {
            match ledger.sweep_past_to_completed(Utc::now().date_naive()).await {
                Ok(0) => info!("Completion sweep: nothing to update"),
                Ok(updated) => info!("Completion sweep: marked {} reservations completed", updated),
                Err(e) => error!("Completion sweep failed: {}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Started completion sweep scheduler with schedule: {}", schedule);
    Ok(())
}
