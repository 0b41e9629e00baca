//! SQLite-backed implementation of the SyncCursorRepository port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::params;
use shotflow_common::storage::SqlitePool;
use shotflow_core::calendar::ports::SyncCursorRepository;
use shotflow_domain::{Result, ShotFlowError, SyncCursor};
use tracing::{debug, instrument};

use crate::errors::InfraError;

/// SQLite implementation of SyncCursorRepository.
pub struct SqliteSyncCursorRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteSyncCursorRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncCursorRepository for SqliteSyncCursorRepository {
    async fn get(&self, user_email: &str, calendar_id: &str) -> Result<Option<SyncCursor>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let result = conn.query_row(
            "SELECT cursor, last_synced_at FROM sync_cursors
             WHERE user_email = ?1 AND calendar_id = ?2",
            params![user_email, calendar_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        );

        match result {
            Ok((cursor, last_synced)) => {
                let last_synced_at = DateTime::from_timestamp(last_synced, 0).ok_or_else(|| {
                    ShotFlowError::Database(format!("cursor timestamp {last_synced} out of range"))
                })?;
                Ok(Some(SyncCursor {
                    user_email: user_email.to_string(),
                    calendar_id: calendar_id.to_string(),
                    cursor,
                    last_synced_at,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    #[instrument(skip(self, cursor), fields(user_email = %cursor.user_email, calendar_id = %cursor.calendar_id))]
    async fn upsert(&self, cursor: &SyncCursor) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        conn.execute(
            "INSERT INTO sync_cursors (user_email, calendar_id, cursor, last_synced_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_email, calendar_id) DO UPDATE SET
                cursor = excluded.cursor,
                last_synced_at = excluded.last_synced_at",
            params![
                cursor.user_email,
                cursor.calendar_id,
                cursor.cursor,
                cursor.last_synced_at.timestamp(),
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, user_email: &str, calendar_id: &str) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let removed = conn
            .execute(
                "DELETE FROM sync_cursors WHERE user_email = ?1 AND calendar_id = ?2",
                params![user_email, calendar_id],
            )
            .map_err(InfraError::from)?;
        debug!(removed, "sync cursor deleted");
        Ok(())
    }
}
