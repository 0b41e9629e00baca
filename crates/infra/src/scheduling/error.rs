//! Scheduler error types.

use std::time::Duration;

use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Errors from the sync scheduler lifecycle.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler already running")]
    AlreadyRunning,

    #[error("scheduler not running")]
    NotRunning,

    #[error("failed to create scheduler: {source}")]
    CreationFailed { source: JobSchedulerError },

    #[error("failed to start scheduler: {source}")]
    StartFailed { source: JobSchedulerError },

    #[error("failed to stop scheduler: {source}")]
    StopFailed { source: JobSchedulerError },

    #[error("failed to register job: {source}")]
    JobRegistrationFailed { source: JobSchedulerError },

    #[error("operation timed out after {duration:?}")]
    Timeout {
        duration: Duration,
        source: tokio::time::error::Elapsed,
    },
}

/// Convenience alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
