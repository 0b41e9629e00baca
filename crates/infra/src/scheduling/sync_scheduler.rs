//! Periodic sync scheduling.
//!
//! Cron-driven jobs: an incremental sync pass over the configured users'
//! calendars, and a maintenance sweep that deactivates expired webhook
//! channels. Lifecycle is explicit: start and stop are timeout-guarded and a
//! cancellation token aborts in-flight work on shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shotflow_core::{ChannelService, SyncEngine};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};

/// Configuration for the sync scheduler.
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Cron expression for the periodic sync job.
    pub sync_cron: String,
    /// Cron expression for the expired-channel sweep.
    pub sweep_cron: String,
    /// Users whose calendars the periodic job syncs.
    pub user_emails: Vec<String>,
    /// Calendar synced for each user.
    pub calendar_id: String,
    /// Timeout applied to one full job execution.
    pub job_timeout: Duration,
    /// Timeout for starting and stopping the underlying scheduler.
    pub lifecycle_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            sync_cron: "0 */15 * * * *".into(), // every 15 minutes
            sweep_cron: "0 0 * * * *".into(),   // hourly
            user_emails: Vec::new(),
            calendar_id: "primary".into(),
            job_timeout: Duration::from_secs(300),
            lifecycle_timeout: Duration::from_secs(5),
        }
    }
}

/// Cron scheduler driving periodic syncs and channel maintenance.
pub struct SyncScheduler {
    scheduler: Option<JobScheduler>,
    config: SyncSchedulerConfig,
    cancellation: CancellationToken,
    engine: Arc<SyncEngine>,
    channels: Arc<ChannelService>,
}

impl SyncScheduler {
    pub fn new(
        config: SyncSchedulerConfig,
        engine: Arc<SyncEngine>,
        channels: Arc<ChannelService>,
    ) -> Self {
        Self { scheduler: None, config, cancellation: CancellationToken::new(), engine, channels }
    }

    /// Start the scheduler and register both jobs.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler = self.build_scheduler().await?;
        let timeout = self.config.lifecycle_timeout;

        tokio::time::timeout(timeout, scheduler.start())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: timeout, source })?
            .map_err(|source| SchedulerError::StartFailed { source })?;

        self.scheduler = Some(scheduler);
        info!(
            sync_cron = %self.config.sync_cron,
            sweep_cron = %self.config.sweep_cron,
            users = self.config.user_emails.len(),
            "sync scheduler started"
        );
        Ok(())
    }

    /// Stop the scheduler and cancel in-flight jobs.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();

        let timeout = self.config.lifecycle_timeout;
        tokio::time::timeout(timeout, scheduler.shutdown())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: timeout, source })?
            .map_err(|source| SchedulerError::StopFailed { source })?;

        info!("sync scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;

        let sync_job = self.build_sync_job()?;
        let sweep_job = self.build_sweep_job()?;

        scheduler
            .add(sync_job)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;
        scheduler
            .add(sweep_job)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        Ok(scheduler)
    }

    fn build_sync_job(&self) -> SchedulerResult<Job> {
        let engine = Arc::clone(&self.engine);
        let user_emails = self.config.user_emails.clone();
        let calendar_id = self.config.calendar_id.clone();
        let job_timeout = self.config.job_timeout;
        let cancel = self.cancellation.clone();

        Job::new_async(self.config.sync_cron.as_str(), move |_id, _lock| {
            let engine = Arc::clone(&engine);
            let user_emails = user_emails.clone();
            let calendar_id = calendar_id.clone();
            let cancel = cancel.clone();

            Box::pin(async move {
                let work = async {
                    for user_email in &user_emails {
                        if cancel.is_cancelled() {
                            debug!("sync job cancelled mid-pass");
                            return;
                        }
                        // A child token lets scheduler shutdown abort the
                        // in-flight run at its next page boundary.
                        let report = engine
                            .sync_calendar_with_cancellation(
                                user_email,
                                &calendar_id,
                                false,
                                cancel.child_token(),
                            )
                            .await;
                        if !report.success {
                            error!(
                                user_email,
                                error = report.error.as_deref().unwrap_or("unknown"),
                                "scheduled sync failed"
                            );
                        }
                    }
                };

                if tokio::time::timeout(job_timeout, work).await.is_err() {
                    warn!(timeout_secs = job_timeout.as_secs(), "scheduled sync timed out");
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })
    }

    fn build_sweep_job(&self) -> SchedulerResult<Job> {
        let channels = Arc::clone(&self.channels);
        let job_timeout = self.config.job_timeout;

        Job::new_async(self.config.sweep_cron.as_str(), move |_id, _lock| {
            let channels = Arc::clone(&channels);

            Box::pin(async move {
                match tokio::time::timeout(job_timeout, channels.sweep_expired_channels(Utc::now()))
                    .await
                {
                    Ok(Ok(swept)) if swept > 0 => {
                        debug!(swept, "channel sweep deactivated expired channels");
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => error!(error = %err, "channel sweep failed"),
                    Err(_) => warn!("channel sweep timed out"),
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })
    }
}
