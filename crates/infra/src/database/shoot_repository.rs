//! SQLite-backed implementation of the ShootStore port.
//!
//! The sync core only reads and clears the calendar linkage columns of a
//! shoot row; everything else on the record belongs to the scheduling tool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;
use shotflow_common::storage::SqlitePool;
use shotflow_core::calendar::ports::{ShootLink, ShootStore};
use shotflow_domain::Result;
use tracing::{info, instrument};

use crate::errors::InfraError;

/// SQLite implementation of ShootStore.
pub struct SqliteShootStore {
    pool: Arc<SqlitePool>,
}

impl SqliteShootStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShootStore for SqliteShootStore {
    async fn find_by_remote_event(&self, remote_event_id: &str) -> Result<Option<ShootLink>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let result = conn.query_row(
            "SELECT id, remote_event_id, calendar_id FROM shoots WHERE remote_event_id = ?1",
            params![remote_event_id],
            |row| {
                Ok(ShootLink {
                    shoot_id: row.get(0)?,
                    remote_event_id: row.get(1)?,
                    calendar_id: row.get(2)?,
                })
            },
        );

        match result {
            Ok(link) => Ok(Some(link)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    #[instrument(skip(self))]
    async fn clear_calendar_link(&self, shoot_id: &str, reason: &str) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let updated = conn
            .execute(
                "UPDATE shoots
                 SET remote_event_id = NULL, calendar_id = NULL, sync_note = ?2, updated_at = ?3
                 WHERE id = ?1",
                params![shoot_id, reason, Utc::now().timestamp()],
            )
            .map_err(InfraError::from)?;

        if updated > 0 {
            info!(shoot_id, reason, "cleared shoot calendar linkage");
        }
        Ok(())
    }

    async fn exists(&self, shoot_id: &str) -> Result<bool> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM shoots WHERE id = ?1", params![shoot_id], |row| {
                row.get(0)
            })
            .map_err(InfraError::from)?;
        Ok(count > 0)
    }
}
