//! Calendar sync engine.
//!
//! Pulls the remote change feed for one (user, calendar) into the local
//! event cache, incrementally when a sync cursor is stored and as a bounded
//! full resync otherwise. A run acquires the per-key lock, secures a valid
//! credential, pages through the feed, applies each item to the cache,
//! persists the provider-issued cursor and finishes with a conflict pass.
//!
//! Error handling follows the error's class: rate limits, 5xx responses and
//! network failures go through exponential backoff; an unauthorized response
//! triggers exactly one credential refresh followed by one more retried run;
//! an expired cursor falls back to a full resync inside the same call.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use shotflow_common::resilience::{
    RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy,
};
use shotflow_domain::constants::{
    DELETED_EXTERNALLY_REASON, MAX_SYNC_ATTEMPTS, RETRY_BASE_DELAY_MS, RETRY_JITTER_RATIO,
    RETRY_MAX_DELAY_SECS, SYNC_HORIZON_DAYS,
};
use shotflow_domain::{
    CachedEvent, ConflictInfo, Credential, EventStatus, Result, ShotFlowError, SyncCursor,
    SyncOutcome, SyncReport, SyncStatus,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::conflicts::ConflictDetector;
use super::credentials::CredentialService;
use super::locks::SyncLockRegistry;
use super::ports::{
    CalendarGateway, EventCacheRepository, ListEventsQuery, RemoteEvent, ShootStore,
    SyncCursorRepository,
};
use super::reconcile::ReconciliationService;

fn default_retry_config() -> RetryConfig {
    RetryConfig::exponential(
        MAX_SYNC_ATTEMPTS,
        std::time::Duration::from_millis(RETRY_BASE_DELAY_MS),
        std::time::Duration::from_secs(RETRY_MAX_DELAY_SECS),
    )
    .with_jitter(RETRY_JITTER_RATIO)
}

/// Retry classification for sync runs: backoff-retryable error classes only.
/// Auth errors are excluded; the engine handles those with a single
/// credential refresh at a higher level.
struct SyncRetryPolicy;

impl RetryPolicy<ShotFlowError> for SyncRetryPolicy {
    fn should_retry(&self, error: &ShotFlowError, _attempt: u32) -> RetryDecision {
        if error.should_retry() {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// The sync engine. One instance serves every (user, calendar) pair; all
/// per-run state lives on the stack of a single `sync_calendar` call.
pub struct SyncEngine {
    gateway: Arc<dyn CalendarGateway>,
    credentials: Arc<CredentialService>,
    cache: Arc<dyn EventCacheRepository>,
    cursors: Arc<dyn SyncCursorRepository>,
    shoots: Arc<dyn ShootStore>,
    detector: ConflictDetector,
    reconciliation: ReconciliationService,
    retry: RetryExecutor<SyncRetryPolicy>,
    locks: SyncLockRegistry,
    horizon_days: i64,
}

impl SyncEngine {
    pub fn new(
        gateway: Arc<dyn CalendarGateway>,
        credentials: Arc<CredentialService>,
        cache: Arc<dyn EventCacheRepository>,
        cursors: Arc<dyn SyncCursorRepository>,
        shoots: Arc<dyn ShootStore>,
    ) -> Self {
        Self {
            detector: ConflictDetector::new(Arc::clone(&cache)),
            reconciliation: ReconciliationService::new(Arc::clone(&cache), Arc::clone(&shoots)),
            gateway,
            credentials,
            cache,
            cursors,
            shoots,
            retry: RetryExecutor::new(default_retry_config(), SyncRetryPolicy),
            locks: SyncLockRegistry::new(),
            horizon_days: SYNC_HORIZON_DAYS,
        }
    }

    /// Override the backoff schedule (tests use short fixed delays).
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config, SyncRetryPolicy);
        self
    }

    pub fn with_horizon_days(mut self, days: i64) -> Self {
        self.horizon_days = days;
        self
    }

    /// Run one sync for (user, calendar) and report the result. Never
    /// panics and never returns `Err`: any failure is folded into the
    /// report as a single classified error.
    pub async fn sync_calendar(
        &self,
        user_email: &str,
        calendar_id: &str,
        force_full: bool,
    ) -> SyncReport {
        self.sync_calendar_with_cancellation(
            user_email,
            calendar_id,
            force_full,
            CancellationToken::new(),
        )
        .await
    }

    /// As [`sync_calendar`](Self::sync_calendar), but abortable: cancelling
    /// the token stops this run at the next page boundary. The token is
    /// scoped to the one run; other runs, and later runs, are unaffected.
    #[instrument(skip(self, cancellation))]
    pub async fn sync_calendar_with_cancellation(
        &self,
        user_email: &str,
        calendar_id: &str,
        force_full: bool,
        cancellation: CancellationToken,
    ) -> SyncReport {
        match self.try_sync_calendar(user_email, calendar_id, force_full, &cancellation).await {
            Ok(outcome) => {
                info!(
                    synced = outcome.synced_count,
                    deleted = outcome.deleted_count,
                    conflicts = outcome.conflict_count,
                    "calendar sync completed"
                );
                SyncReport::success(outcome)
            }
            Err(err) => {
                error!(error = %err, class = err.label(), "calendar sync failed");
                SyncReport::failure(&err)
            }
        }
    }

    /// As [`sync_calendar`](Self::sync_calendar), but propagating the
    /// classified error for callers that branch on it.
    pub async fn try_sync_calendar(
        &self,
        user_email: &str,
        calendar_id: &str,
        force_full: bool,
        cancellation: &CancellationToken,
    ) -> Result<SyncOutcome> {
        // Serialize runs per (user, calendar); interleaved cursor writes
        // would leave the cursor pointing mid-sequence.
        let _guard = self.locks.acquire(user_email, calendar_id).await;

        let credential = self.credentials.ensure_valid(user_email).await?;

        let first = self
            .retry
            .execute(|| self.run_once(&credential, user_email, calendar_id, force_full, cancellation))
            .await;

        let err = match first {
            Ok(outcome) => return Ok(outcome),
            Err(retry_err) => retry_err.into_source(),
        };

        if !err.needs_token_refresh() {
            return Err(err);
        }

        // The token was rejected mid-run despite passing the expiry check;
        // refresh once and repeat the whole run. A second rejection is
        // surfaced as-is.
        warn!(user_email, calendar_id, "unauthorized mid-sync, refreshing credential once");
        let refreshed = self.credentials.force_refresh(user_email).await?;

        self.retry
            .execute(|| self.run_once(&refreshed, user_email, calendar_id, force_full, cancellation))
            .await
            .map_err(RetryError::into_source)
    }

    /// Standalone conflict probe for a candidate interval, used before
    /// creating or rescheduling an event.
    pub async fn check_conflicts_for_interval(
        &self,
        user_email: &str,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<ConflictInfo> {
        self.detector.check_interval(user_email, calendar_id, start, end, exclude_id).await
    }

    /// Direct existence check for a remote event referenced locally. When
    /// the remote reports it gone, runs externally-deleted-event
    /// reconciliation and returns `false`.
    #[instrument(skip(self))]
    pub async fn verify_remote_event(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
    ) -> Result<bool> {
        let credential = self.credentials.ensure_valid(user_email).await?;

        let found = match self.gateway.get_event(&credential, calendar_id, remote_event_id).await {
            Ok(found) => found,
            Err(ShotFlowError::NotFound(_)) => None,
            Err(err) => return Err(err),
        };

        if found.is_some() {
            return Ok(true);
        }

        warn!(remote_event_id, "referenced remote event no longer exists");
        self.reconciliation
            .handle_external_deletion(user_email, calendar_id, remote_event_id)
            .await?;
        Ok(false)
    }

    /// Reconciliation pass for cached events whose shoot record was deleted.
    pub async fn cleanup_dangling_shoot_links(
        &self,
        user_email: &str,
        calendar_id: &str,
    ) -> Result<usize> {
        self.reconciliation.cleanup_dangling_shoot_links(user_email, calendar_id).await
    }

    /// One retryable unit of work: cursor selection, fetch, apply, cursor
    /// persist, conflict pass. An expired cursor downgrades to a full
    /// resync within the same unit instead of failing it.
    async fn run_once(
        &self,
        credential: &Credential,
        user_email: &str,
        calendar_id: &str,
        force_full: bool,
        cancellation: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let cursor = if force_full {
            None
        } else {
            self.cursors.get(user_email, calendar_id).await?.map(|c| c.cursor)
        };
        let incremental = cursor.is_some();

        match self.run_pass(credential, user_email, calendar_id, cursor, cancellation).await {
            Err(err) if incremental && err.is_cursor_expired() => {
                warn!(
                    user_email,
                    calendar_id, "stored sync cursor rejected by provider, running full resync"
                );
                self.run_pass(credential, user_email, calendar_id, None, cancellation).await
            }
            other => other,
        }
    }

    async fn run_pass(
        &self,
        credential: &Credential,
        user_email: &str,
        calendar_id: &str,
        cursor: Option<String>,
        cancellation: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let window = if cursor.is_none() {
            // Full sync: drop the derived cache and stale cursor before
            // fetching so a crash mid-run leaves "needs full resync", never
            // a half-merged cache.
            let cleared = self.cache.clear_calendar(user_email, calendar_id).await?;
            self.cursors.delete(user_email, calendar_id).await?;
            debug!(cleared, "cleared local cache for full resync");
            Some(self.sync_window())
        } else {
            None
        };

        let mut outcome = SyncOutcome::default();
        let mut page_token: Option<String> = None;
        let mut final_cursor: Option<String> = None;

        loop {
            // Cancellation is honored between pages only; completed pages
            // stay persisted and the run is resumable.
            if cancellation.is_cancelled() {
                return Err(ShotFlowError::Internal("sync cancelled by caller".into()));
            }

            let query = ListEventsQuery {
                time_min: window.map(|(min, _)| min),
                time_max: window.map(|(_, max)| max),
                cursor: cursor.clone(),
                page_token: page_token.take(),
            };

            let page = self.gateway.list_events(credential, calendar_id, &query).await?;
            debug!(events = page.events.len(), "fetched change feed page");

            for event in &page.events {
                if let Err(err) = self.apply_remote_event(user_email, calendar_id, event, &mut outcome).await
                {
                    // A single bad item must not abort the rest of the page.
                    warn!(
                        error = %err,
                        remote_event_id = event.id.as_deref().unwrap_or("<missing>"),
                        "failed to apply remote event, continuing"
                    );
                }
            }

            if page.next_cursor.is_some() {
                final_cursor = page.next_cursor;
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        // Persist only a provider-issued cursor. A full-sync response may
        // legitimately omit one; the next run then performs another full
        // sync.
        if let Some(value) = &final_cursor {
            self.cursors
                .upsert(&SyncCursor {
                    user_email: user_email.to_string(),
                    calendar_id: calendar_id.to_string(),
                    cursor: value.clone(),
                    last_synced_at: Utc::now(),
                })
                .await?;
        }
        outcome.next_cursor = final_cursor;

        outcome.conflict_count = self.detector.run_full_pass(user_email, calendar_id).await?;

        Ok(outcome)
    }

    /// Apply one change-feed item to the cache, updating the run counters.
    async fn apply_remote_event(
        &self,
        user_email: &str,
        calendar_id: &str,
        event: &RemoteEvent,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        let Some(remote_event_id) = event.id.as_deref() else {
            warn!("change feed item lacks a stable id, skipping");
            return Ok(());
        };

        if event.is_cancelled() {
            let existed = self.cache.delete_event(user_email, calendar_id, remote_event_id).await?;
            if !existed {
                debug!(remote_event_id, "cancellation for an event not in the cache");
            }
            // Counted whether or not a row existed, so repeated
            // notifications stay idempotent in effect and visible in counts.
            outcome.deleted_count += 1;

            if let Some(link) = self.shoots.find_by_remote_event(remote_event_id).await? {
                self.shoots.clear_calendar_link(&link.shoot_id, DELETED_EXTERNALLY_REASON).await?;
                info!(
                    remote_event_id,
                    shoot_id = %link.shoot_id,
                    "cleared shoot linkage for externally deleted event"
                );
            }
            return Ok(());
        }

        let (Some(title), Some(start_time), Some(end_time)) =
            (event.title.as_deref(), event.start_time, event.end_time)
        else {
            // Providers emit placeholder items without a usable payload.
            debug!(remote_event_id, "incomplete event payload, skipping");
            return Ok(());
        };

        let cached = CachedEvent {
            user_email: user_email.to_string(),
            calendar_id: calendar_id.to_string(),
            remote_event_id: remote_event_id.to_string(),
            title: title.to_string(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time,
            end_time,
            status: event.status.unwrap_or(EventStatus::Confirmed),
            attendees: event.attendees.clone(),
            is_recurring: event.recurring_event_id.is_some(),
            recurring_event_id: event.recurring_event_id.clone(),
            etag: event.etag.clone(),
            last_modified: event.last_modified,
            sync_status: SyncStatus::Synced,
            conflict_detected: false,
            // The repository preserves an existing shoot link on update.
            shoot_id: None,
        };

        self.cache.upsert_event(&cached).await?;
        outcome.synced_count += 1;
        Ok(())
    }

    /// Full-sync fetch window: start of today (UTC) through the forward
    /// horizon.
    fn sync_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        (start, start + Duration::days(self.horizon_days))
    }
}
