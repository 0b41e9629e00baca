//! Scheduling conflict detection.
//!
//! Pure half-open interval overlap over the cached event set, plus the
//! service that persists conflict flags during a sync pass and answers
//! standalone "would this interval collide" queries before an event is
//! created or rescheduled.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use shotflow_domain::{CachedEvent, ConflictInfo, Result, ShotFlowError};
use tracing::{debug, instrument};

use super::ports::EventCacheRepository;

/// Half-open interval overlap: [s1, e1) and [s2, e2) conflict iff
/// `s1 < e2 && s2 < e1`. Back-to-back events sharing only a boundary
/// instant do not conflict.
pub fn intervals_overlap(
    s1: DateTime<Utc>,
    e1: DateTime<Utc>,
    s2: DateTime<Utc>,
    e2: DateTime<Utc>,
) -> bool {
    s1 < e2 && s2 < e1
}

/// Events whose interval overlaps [start, end), excluding `exclude_id`.
pub fn find_overlaps<'a>(
    events: &'a [CachedEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_id: Option<&str>,
) -> Vec<&'a CachedEvent> {
    events
        .iter()
        .filter(|event| exclude_id != Some(event.remote_event_id.as_str()))
        .filter(|event| intervals_overlap(event.start_time, event.end_time, start, end))
        .collect()
}

/// Remote event ids with at least one overlapping counterpart in the set.
pub fn conflicting_ids(events: &[CachedEvent]) -> HashSet<String> {
    let mut ids = HashSet::new();
    for (i, a) in events.iter().enumerate() {
        for b in events.iter().skip(i + 1) {
            if intervals_overlap(a.start_time, a.end_time, b.start_time, b.end_time) {
                ids.insert(a.remote_event_id.clone());
                ids.insert(b.remote_event_id.clone());
            }
        }
    }
    ids
}

/// Conflict detection over one calendar's event cache.
pub struct ConflictDetector {
    cache: Arc<dyn EventCacheRepository>,
}

impl ConflictDetector {
    pub fn new(cache: Arc<dyn EventCacheRepository>) -> Self {
        Self { cache }
    }

    /// Standalone conflict check for a candidate interval, used before
    /// creating or rescheduling an event. Rejects inverted intervals before
    /// touching storage.
    #[instrument(skip(self))]
    pub async fn check_interval(
        &self,
        user_email: &str,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<ConflictInfo> {
        if end <= start {
            return Err(ShotFlowError::Validation(
                "interval end must be after interval start".into(),
            ));
        }

        let events = self.cache.list_events(user_email, calendar_id).await?;
        let conflicting: Vec<CachedEvent> =
            find_overlaps(&events, start, end, exclude_id).into_iter().cloned().collect();

        Ok(ConflictInfo { has_conflict: !conflicting.is_empty(), conflicting_events: conflicting })
    }

    /// Full conflict pass for one (user, calendar), run at the end of a sync.
    ///
    /// Every event with at least one overlapping counterpart is flagged
    /// (`conflict_detected`, sync status error); events with no overlap are
    /// left synced. Returns the number of events in conflict.
    #[instrument(skip(self))]
    pub async fn run_full_pass(&self, user_email: &str, calendar_id: &str) -> Result<usize> {
        let events = self.cache.list_events(user_email, calendar_id).await?;
        let in_conflict = conflicting_ids(&events);

        for event in &events {
            let flagged = in_conflict.contains(&event.remote_event_id);
            if flagged != event.conflict_detected {
                self.cache
                    .set_conflict_state(user_email, calendar_id, &event.remote_event_id, flagged)
                    .await?;
            }
        }

        debug!(
            user_email,
            calendar_id,
            total = events.len(),
            conflicts = in_conflict.len(),
            "conflict pass completed"
        );

        Ok(in_conflict.len())
    }
}
