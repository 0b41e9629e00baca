//! Reconciliation of externally-deleted events and dangling shoot links.
//!
//! A remote event can disappear while an internal shoot record still points
//! at it, and a shoot can be deleted while its cached event still carries
//! the back-reference. Both passes here are idempotent and safe to run
//! concurrently with a fresh create of a same-named event.

use std::sync::Arc;

use shotflow_domain::constants::DELETED_EXTERNALLY_REASON;
use shotflow_domain::Result;
use tracing::{debug, info, instrument};

use super::ports::{EventCacheRepository, ShootStore};

/// Reconciliation service over the event cache and the shoot store.
pub struct ReconciliationService {
    cache: Arc<dyn EventCacheRepository>,
    shoots: Arc<dyn ShootStore>,
}

impl ReconciliationService {
    pub fn new(cache: Arc<dyn EventCacheRepository>, shoots: Arc<dyn ShootStore>) -> Self {
        Self { cache, shoots }
    }

    /// Handle a remote event discovered to no longer exist: drop the cached
    /// mirror and clear any internal record pointing at it, annotating the
    /// record with a human-readable reason instead of leaving a dangling
    /// reference.
    ///
    /// Removing an already-absent cache row is a no-op, not an error.
    #[instrument(skip(self))]
    pub async fn handle_external_deletion(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
    ) -> Result<()> {
        let removed = self.cache.delete_event(user_email, calendar_id, remote_event_id).await?;

        if let Some(link) = self.shoots.find_by_remote_event(remote_event_id).await? {
            self.shoots.clear_calendar_link(&link.shoot_id, DELETED_EXTERNALLY_REASON).await?;
            info!(
                remote_event_id,
                shoot_id = %link.shoot_id,
                "cleared calendar linkage for externally deleted event"
            );
        } else {
            debug!(remote_event_id, removed, "no internal record linked to deleted event");
        }

        Ok(())
    }

    /// Sweep the cache for events whose referenced shoot no longer exists
    /// and detach the stale back-reference. Returns the number of links
    /// cleared.
    #[instrument(skip(self))]
    pub async fn cleanup_dangling_shoot_links(
        &self,
        user_email: &str,
        calendar_id: &str,
    ) -> Result<usize> {
        let events = self.cache.list_events(user_email, calendar_id).await?;
        let mut cleared = 0;

        for event in events {
            let Some(shoot_id) = event.shoot_id.as_deref() else { continue };

            if !self.shoots.exists(shoot_id).await? {
                self.cache
                    .set_shoot_link(user_email, calendar_id, &event.remote_event_id, None)
                    .await?;
                debug!(
                    remote_event_id = %event.remote_event_id,
                    shoot_id,
                    "detached dangling shoot reference"
                );
                cleared += 1;
            }
        }

        Ok(cleared)
    }
}
