//! Periodic pruning of the refresh token blacklist
//!
//! Revoked jtis only need to be remembered until the token they belong to
//! would have expired anyway; a daily sweep deletes the rest.

use anyhow::Result;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::repositories::BlacklistRepository;
use crate::session::RevocationStore;

/// Start the recurring blacklist prune job
pub async fn start_prune_job(blacklist: BlacklistRepository, schedule: &str) -> Result<()> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let blacklist = blacklist.clone();
        Box::pin(async move {
            match blacklist.prune(Utc::now()).await {
                Ok(0) => info!("Blacklist prune: no expired entries"),
                Ok(deleted) => info!("Blacklist prune: deleted {} expired entries", deleted),
                Err(e) => error!("Blacklist prune failed: {}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Started blacklist prune scheduler with schedule: {}", schedule);
    Ok(())
}
