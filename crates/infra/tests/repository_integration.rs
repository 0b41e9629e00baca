//! SQLite repository integration tests against a real on-disk database.

mod support;

use chrono::{Duration, Utc};
use shotflow_core::calendar::ports::{
    CredentialStore, EventCacheRepository, ShootStore, SyncCursorRepository,
    WebhookChannelRepository,
};
use shotflow_domain::{Attendee, Credential, SyncCursor, SyncStatus};
use shotflow_infra::{
    SqliteCredentialStore, SqliteEventCacheRepository, SqliteShootStore,
    SqliteSyncCursorRepository, SqliteWebhookChannelRepository,
};
use support::{cached_event, channel, ts, TestDatabase, CALENDAR, USER};

#[tokio::test]
async fn event_upsert_round_trips_all_fields() {
    let db = TestDatabase::new();
    let repo = SqliteEventCacheRepository::new(db.pool());

    let mut event = cached_event("e1", ts(10, 0), ts(11, 0));
    event.attendees = vec![Attendee {
        email: "grip@example.com".into(),
        display_name: Some("Grip".into()),
        response_status: Some("accepted".into()),
    }];
    event.recurring_event_id = Some("series-1".into());
    event.is_recurring = true;

    repo.upsert_event(&event).await.expect("upsert");

    let loaded = repo
        .get_event(USER, CALENDAR, "e1")
        .await
        .expect("get")
        .expect("event present");
    assert_eq!(loaded.title, event.title);
    assert_eq!(loaded.start_time, event.start_time);
    assert_eq!(loaded.end_time, event.end_time);
    assert_eq!(loaded.attendees, event.attendees);
    assert_eq!(loaded.etag, event.etag);
    assert!(loaded.is_recurring);
    assert_eq!(loaded.recurring_event_id.as_deref(), Some("series-1"));
    assert_eq!(loaded.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn event_update_preserves_shoot_link() {
    let db = TestDatabase::new();
    let repo = SqliteEventCacheRepository::new(db.pool());

    repo.upsert_event(&cached_event("e1", ts(10, 0), ts(11, 0))).await.expect("insert");
    repo.set_shoot_link(USER, CALENDAR, "e1", Some("shoot-42")).await.expect("link");

    // A later sync pass re-upserts the same event with no shoot link set.
    let mut updated = cached_event("e1", ts(10, 0), ts(12, 0));
    updated.title = "renamed".into();
    repo.upsert_event(&updated).await.expect("update");

    let loaded = repo.get_event(USER, CALENDAR, "e1").await.expect("get").expect("present");
    assert_eq!(loaded.title, "renamed");
    assert_eq!(loaded.end_time, ts(12, 0));
    assert_eq!(loaded.shoot_id.as_deref(), Some("shoot-42"), "link must survive the update");
}

#[tokio::test]
async fn delete_event_reports_whether_a_row_existed() {
    let db = TestDatabase::new();
    let repo = SqliteEventCacheRepository::new(db.pool());

    repo.upsert_event(&cached_event("e1", ts(10, 0), ts(11, 0))).await.expect("insert");

    assert!(repo.delete_event(USER, CALENDAR, "e1").await.expect("delete"));
    assert!(!repo.delete_event(USER, CALENDAR, "e1").await.expect("re-delete"), "idempotent");
}

#[tokio::test]
async fn list_events_is_scoped_and_ordered_by_start() {
    let db = TestDatabase::new();
    let repo = SqliteEventCacheRepository::new(db.pool());

    repo.upsert_event(&cached_event("late", ts(15, 0), ts(16, 0))).await.expect("insert");
    repo.upsert_event(&cached_event("early", ts(9, 0), ts(10, 0))).await.expect("insert");

    let mut other_calendar = cached_event("elsewhere", ts(8, 0), ts(9, 0));
    other_calendar.calendar_id = "work".into();
    repo.upsert_event(&other_calendar).await.expect("insert");

    let events = repo.list_events(USER, CALENDAR).await.expect("list");
    let ids: Vec<&str> = events.iter().map(|e| e.remote_event_id.as_str()).collect();
    assert_eq!(ids, vec!["early", "late"]);
}

#[tokio::test]
async fn clear_calendar_removes_only_that_pair() {
    let db = TestDatabase::new();
    let repo = SqliteEventCacheRepository::new(db.pool());

    repo.upsert_event(&cached_event("a", ts(9, 0), ts(10, 0))).await.expect("insert");
    repo.upsert_event(&cached_event("b", ts(11, 0), ts(12, 0))).await.expect("insert");
    let mut other = cached_event("c", ts(9, 0), ts(10, 0));
    other.calendar_id = "work".into();
    repo.upsert_event(&other).await.expect("insert");

    let removed = repo.clear_calendar(USER, CALENDAR).await.expect("clear");
    assert_eq!(removed, 2);
    assert!(repo.list_events(USER, CALENDAR).await.expect("list").is_empty());
    assert_eq!(repo.list_events(USER, "work").await.expect("list").len(), 1);
}

#[tokio::test]
async fn conflict_state_updates_flag_and_status_together() {
    let db = TestDatabase::new();
    let repo = SqliteEventCacheRepository::new(db.pool());

    repo.upsert_event(&cached_event("e1", ts(10, 0), ts(11, 0))).await.expect("insert");
    repo.set_conflict_state(USER, CALENDAR, "e1", true).await.expect("flag");

    let loaded = repo.get_event(USER, CALENDAR, "e1").await.expect("get").expect("present");
    assert!(loaded.conflict_detected);
    assert_eq!(loaded.sync_status, SyncStatus::Error);

    repo.set_conflict_state(USER, CALENDAR, "e1", false).await.expect("unflag");
    let loaded = repo.get_event(USER, CALENDAR, "e1").await.expect("get").expect("present");
    assert!(!loaded.conflict_detected);
    assert_eq!(loaded.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn cursor_lifecycle_get_upsert_delete() {
    let db = TestDatabase::new();
    let repo = SqliteSyncCursorRepository::new(db.pool());

    assert!(repo.get(USER, CALENDAR).await.expect("get").is_none());

    let cursor = SyncCursor {
        user_email: USER.into(),
        calendar_id: CALENDAR.into(),
        cursor: "abc".into(),
        last_synced_at: ts(12, 0),
    };
    repo.upsert(&cursor).await.expect("upsert");

    let loaded = repo.get(USER, CALENDAR).await.expect("get").expect("present");
    assert_eq!(loaded.cursor, "abc");
    assert_eq!(loaded.last_synced_at, ts(12, 0));

    // Upsert replaces in place.
    repo.upsert(&SyncCursor { cursor: "def".into(), ..cursor }).await.expect("replace");
    assert_eq!(repo.get(USER, CALENDAR).await.expect("get").expect("present").cursor, "def");

    repo.delete(USER, CALENDAR).await.expect("delete");
    assert!(repo.get(USER, CALENDAR).await.expect("get").is_none());
    // Deleting again is a no-op.
    repo.delete(USER, CALENDAR).await.expect("re-delete");
}

#[tokio::test]
async fn only_one_active_channel_per_pair_is_allowed() {
    let db = TestDatabase::new();
    let repo = SqliteWebhookChannelRepository::new(db.pool());
    let expiry = Utc::now() + Duration::days(7);

    repo.insert(&channel("ch-1", true, expiry)).await.expect("insert");

    // A second active row for the same (user, calendar) violates the
    // partial unique index.
    let err = repo.insert(&channel("ch-2", true, expiry)).await.expect_err("must fail");
    assert!(err.to_string().contains("unique"), "unexpected error: {err}");

    // Deactivating the first makes room for a replacement.
    assert!(repo.deactivate("ch-1").await.expect("deactivate"));
    assert!(!repo.deactivate("ch-1").await.expect("re-deactivate"), "already inactive");
    repo.insert(&channel("ch-2", true, expiry)).await.expect("replacement fits");

    let active = repo.find_active(USER, CALENDAR).await.expect("find").expect("present");
    assert_eq!(active.channel_id, "ch-2");
}

#[tokio::test]
async fn expired_channel_listing_ignores_inactive_and_live_rows() {
    let db = TestDatabase::new();
    let repo = SqliteWebhookChannelRepository::new(db.pool());
    let now = Utc::now();

    let mut old_active = channel("expired", true, now - Duration::hours(2));
    old_active.calendar_id = "work".into();
    repo.insert(&old_active).await.expect("insert");
    repo.insert(&channel("live", true, now + Duration::days(3))).await.expect("insert");
    let mut old_inactive = channel("dead", false, now - Duration::days(5));
    old_inactive.calendar_id = "archive".into();
    repo.insert(&old_inactive).await.expect("insert");

    let expired = repo.list_expired(now).await.expect("list");
    let ids: Vec<&str> = expired.iter().map(|c| c.channel_id.as_str()).collect();
    assert_eq!(ids, vec!["expired"]);
}

#[tokio::test]
async fn credential_upsert_replaces_token_set_atomically() {
    let db = TestDatabase::new();
    let store = SqliteCredentialStore::new(db.pool());

    assert!(store.get(USER, "google").await.expect("get").is_none());

    let first = Credential {
        access_token: "at-1".into(),
        refresh_token: Some("rt-1".into()),
        expires_at: ts(13, 0),
    };
    store.upsert(USER, "google", &first).await.expect("insert");

    let second = Credential {
        access_token: "at-2".into(),
        refresh_token: None,
        expires_at: ts(14, 0),
    };
    store.upsert(USER, "google", &second).await.expect("replace");

    let loaded = store.get(USER, "google").await.expect("get").expect("present");
    assert_eq!(loaded.access_token, "at-2");
    assert_eq!(loaded.refresh_token, None);
    assert_eq!(loaded.expires_at, ts(14, 0));
}

#[tokio::test]
async fn shoot_link_is_cleared_with_a_reason() {
    let db = TestDatabase::new();
    let store = SqliteShootStore::new(db.pool());

    {
        let conn = db.manager.get_connection().expect("connection");
        conn.execute(
            "INSERT INTO shoots (id, title, remote_event_id, calendar_id, updated_at)
             VALUES ('shoot-42', 'brand shoot', 'E1', 'primary', 0)",
            [],
        )
        .expect("seed shoot");
    }

    let link = store.find_by_remote_event("E1").await.expect("find").expect("present");
    assert_eq!(link.shoot_id, "shoot-42");
    assert!(store.exists("shoot-42").await.expect("exists"));

    store.clear_calendar_link("shoot-42", "deleted externally").await.expect("clear");
    assert!(store.find_by_remote_event("E1").await.expect("find").is_none());

    let conn = db.manager.get_connection().expect("connection");
    let note: Option<String> = conn
        .query_row("SELECT sync_note FROM shoots WHERE id = 'shoot-42'", [], |row| row.get(0))
        .expect("row present");
    assert_eq!(note.as_deref(), Some("deleted externally"));

    // Idempotent on an already-cleared record.
    store.clear_calendar_link("shoot-42", "deleted externally").await.expect("re-clear");
}
