use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::scrape::ScrapeJob;

/// Fires the scrape pipeline on a cron schedule, plus once immediately
/// at startup.
///
/// Runs never overlap: a trigger that arrives while a run is still
/// executing is skipped with a warning instead of queued. Overlap would
/// not corrupt data (storage is idempotent) but it would double-count
/// reconciliation work and confuse the run summaries.
pub struct ScrapeScheduler {
    inner: JobScheduler,
    job: Arc<ScrapeJob>,
    run_guard: Arc<Mutex<()>>,
}

impl ScrapeScheduler {
    pub async fn new(cron: &str, job: Arc<ScrapeJob>) -> Result<Self> {
        let inner = JobScheduler::new().await?;
        let run_guard = Arc::new(Mutex::new(()));

        let guard = run_guard.clone();
        let scheduled_job = job.clone();
        let cron_job = Job::new_async(cron, move |_uuid, _lock| {
            let job = scheduled_job.clone();
            let guard = guard.clone();
            Box::pin(async move {
                run_guarded(&job, &guard).await;
            })
        })
        .with_context(|| format!("invalid cron expression: {cron}"))?;

        inner.add(cron_job).await?;

        info!(cron, "scheduled scraping");
        Ok(Self {
            inner,
            job,
            run_guard,
        })
    }

    pub async fn start(&self) -> Result<()> {
        self.inner.start().await?;

        // the original trigger-at-startup behavior: do not wait for the
        // first cron tick to catch up
        let job = self.job.clone();
        let guard = self.run_guard.clone();
        tokio::spawn(async move {
            run_guarded(&job, &guard).await;
        });

        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

async fn run_guarded(job: &ScrapeJob, guard: &Mutex<()>) {
    match guard.try_lock() {
        Ok(_held) => {
            if let Err(e) = job.run().await {
                error!("scrape run failed: {e:#}");
            }
        }
        Err(_) => {
            warn!("previous scrape run still in progress, skipping this trigger");
        }
    }
}
