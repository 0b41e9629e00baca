//! SQLite-backed implementation of the EventCacheRepository port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use shotflow_common::storage::SqlitePool;
use shotflow_core::calendar::ports::EventCacheRepository;
use shotflow_domain::{Attendee, CachedEvent, EventStatus, Result, SyncStatus};
use tracing::{debug, instrument};

use crate::errors::InfraError;

/// SQLite implementation of EventCacheRepository.
pub struct SqliteEventCacheRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteEventCacheRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

fn timestamp_to_datetime(column: usize, ts: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Integer,
            format!("timestamp {ts} out of range").into(),
        )
    })
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<CachedEvent> {
    let status: String = row.get(8)?;
    let attendees_json: String = row.get(9)?;
    let attendees: Vec<Attendee> = serde_json::from_str(&attendees_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;
    let sync_status: String = row.get(14)?;

    Ok(CachedEvent {
        user_email: row.get(0)?,
        calendar_id: row.get(1)?,
        remote_event_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        location: row.get(5)?,
        start_time: timestamp_to_datetime(6, row.get(6)?)?,
        end_time: timestamp_to_datetime(7, row.get(7)?)?,
        status: EventStatus::parse(&status),
        attendees,
        is_recurring: row.get(10)?,
        recurring_event_id: row.get(11)?,
        etag: row.get(12)?,
        last_modified: row
            .get::<_, Option<i64>>(13)?
            .map(|ts| timestamp_to_datetime(13, ts))
            .transpose()?,
        sync_status: SyncStatus::parse(&sync_status),
        conflict_detected: row.get(15)?,
        shoot_id: row.get(16)?,
    })
}

const EVENT_COLUMNS: &str = "user_email, calendar_id, remote_event_id, title, description,
    location, start_ts, end_ts, status, attendees, is_recurring,
    recurring_event_id, etag, last_modified_ts, sync_status,
    conflict_detected, shoot_id";

#[async_trait]
impl EventCacheRepository for SqliteEventCacheRepository {
    #[instrument(skip(self, event), fields(remote_event_id = %event.remote_event_id))]
    async fn upsert_event(&self, event: &CachedEvent) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let attendees =
            serde_json::to_string(&event.attendees).map_err(InfraError::from)?;

        // The update branch deliberately leaves shoot_id untouched so a
        // re-synced event keeps its existing shoot link.
        conn.execute(
            "INSERT INTO cached_events (
                user_email, calendar_id, remote_event_id, title, description,
                location, start_ts, end_ts, status, attendees, is_recurring,
                recurring_event_id, etag, last_modified_ts, sync_status,
                conflict_detected, shoot_id, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT(user_email, calendar_id, remote_event_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                location = excluded.location,
                start_ts = excluded.start_ts,
                end_ts = excluded.end_ts,
                status = excluded.status,
                attendees = excluded.attendees,
                is_recurring = excluded.is_recurring,
                recurring_event_id = excluded.recurring_event_id,
                etag = excluded.etag,
                last_modified_ts = excluded.last_modified_ts,
                sync_status = excluded.sync_status,
                conflict_detected = excluded.conflict_detected,
                updated_at = excluded.updated_at",
            params![
                event.user_email,
                event.calendar_id,
                event.remote_event_id,
                event.title,
                event.description,
                event.location,
                event.start_time.timestamp(),
                event.end_time.timestamp(),
                event.status.as_str(),
                attendees,
                event.is_recurring,
                event.recurring_event_id,
                event.etag,
                event.last_modified.map(|ts| ts.timestamp()),
                event.sync_status.as_str(),
                event.conflict_detected,
                event.shoot_id,
                Utc::now().timestamp(),
            ],
        )
        .map_err(InfraError::from)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_event(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
    ) -> Result<bool> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let removed = conn
            .execute(
                "DELETE FROM cached_events
                 WHERE user_email = ?1 AND calendar_id = ?2 AND remote_event_id = ?3",
                params![user_email, calendar_id, remote_event_id],
            )
            .map_err(InfraError::from)?;
        Ok(removed > 0)
    }

    async fn get_event(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
    ) -> Result<Option<CachedEvent>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let result = conn.query_row(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM cached_events
                 WHERE user_email = ?1 AND calendar_id = ?2 AND remote_event_id = ?3"
            ),
            params![user_email, calendar_id, remote_event_id],
            row_to_event,
        );

        match result {
            Ok(event) => Ok(Some(event)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    async fn list_events(&self, user_email: &str, calendar_id: &str) -> Result<Vec<CachedEvent>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM cached_events
                 WHERE user_email = ?1 AND calendar_id = ?2
                 ORDER BY start_ts ASC"
            ))
            .map_err(InfraError::from)?;

        let events = stmt
            .query_map(params![user_email, calendar_id], row_to_event)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(events)
    }

    #[instrument(skip(self))]
    async fn clear_calendar(&self, user_email: &str, calendar_id: &str) -> Result<usize> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let removed = conn
            .execute(
                "DELETE FROM cached_events WHERE user_email = ?1 AND calendar_id = ?2",
                params![user_email, calendar_id],
            )
            .map_err(InfraError::from)?;
        debug!(removed, "cleared cached events");
        Ok(removed)
    }

    async fn set_conflict_state(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
        in_conflict: bool,
    ) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let sync_status = if in_conflict { SyncStatus::Error } else { SyncStatus::Synced };
        conn.execute(
            "UPDATE cached_events
             SET conflict_detected = ?4, sync_status = ?5, updated_at = ?6
             WHERE user_email = ?1 AND calendar_id = ?2 AND remote_event_id = ?3",
            params![
                user_email,
                calendar_id,
                remote_event_id,
                in_conflict,
                sync_status.as_str(),
                Utc::now().timestamp(),
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    async fn set_shoot_link(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
        shoot_id: Option<&str>,
    ) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        conn.execute(
            "UPDATE cached_events
             SET shoot_id = ?4, updated_at = ?5
             WHERE user_email = ?1 AND calendar_id = ?2 AND remote_event_id = ?3",
            params![user_email, calendar_id, remote_event_id, shoot_id, Utc::now().timestamp()],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }
}
