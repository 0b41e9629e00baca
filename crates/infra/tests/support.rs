//! Shared helpers for infra integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use shotflow_common::storage::SqlitePool;
use shotflow_domain::{CachedEvent, EventStatus, SyncStatus, WebhookChannel};
use shotflow_infra::DbManager;
use tempfile::TempDir;

pub const USER: &str = "ava@example.com";
pub const CALENDAR: &str = "primary";

/// Temporary on-disk database with the full schema applied.
pub struct TestDatabase {
    pub manager: DbManager,
    _temp: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        shotflow_common::telemetry::init_tracing("warn");
        let temp = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp.path().join("test.db"), 4).expect("manager created");
        manager.run_migrations().expect("migrations run");
        Self { manager, _temp: temp }
    }

    pub fn pool(&self) -> Arc<SqlitePool> {
        Arc::clone(self.manager.pool())
    }
}

pub fn ts(hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, hour, min, 0).single().expect("valid timestamp")
}

pub fn cached_event(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CachedEvent {
    CachedEvent {
        user_email: USER.into(),
        calendar_id: CALENDAR.into(),
        remote_event_id: id.into(),
        title: format!("event {id}"),
        description: Some("integration test event".into()),
        location: None,
        start_time: start,
        end_time: end,
        status: EventStatus::Confirmed,
        attendees: Vec::new(),
        is_recurring: false,
        recurring_event_id: None,
        etag: Some(format!("etag-{id}")),
        last_modified: Some(start),
        sync_status: SyncStatus::Synced,
        conflict_detected: false,
        shoot_id: None,
    }
}

pub fn channel(channel_id: &str, active: bool, expiration: DateTime<Utc>) -> WebhookChannel {
    WebhookChannel {
        channel_id: channel_id.into(),
        user_email: USER.into(),
        calendar_id: CALENDAR.into(),
        resource_id: format!("res-{channel_id}"),
        resource_uri: "https://www.googleapis.com/calendar/v3/calendars/primary/events".into(),
        verification_token: None,
        expiration,
        active,
    }
}
