//! Per-(user, calendar) sync serialization.
//!
//! Interleaved cursor writes from concurrent runs over the same calendar
//! would break the incremental-sync invariant (the cursor must always
//! reflect a causally-complete page sequence), so runs for the same key are
//! serialized. Runs for different keys proceed fully in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of async mutexes keyed by (user_email, calendar_id).
#[derive(Default)]
pub struct SyncLockRegistry {
    locks: StdMutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl SyncLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one (user, calendar), waiting if a run for the
    /// same key is in flight.
    pub async fn acquire(&self, user_email: &str, calendar_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks
                .entry((user_email.to_string(), calendar_id.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }
}
