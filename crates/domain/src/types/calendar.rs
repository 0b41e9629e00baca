//! Calendar sync type definitions
//!
//! Shared types for cached remote events, sync cursors, webhook channels and
//! sync results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote-reported event status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    /// Parse a provider status string, defaulting unknown values to
    /// `Confirmed` (providers occasionally emit vendor-specific statuses).
    pub fn parse(value: &str) -> Self {
        match value {
            "cancelled" => Self::Cancelled,
            "tentative" => Self::Tentative,
            _ => Self::Confirmed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Tentative => "tentative",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Local sync state of a cached event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Pending,
    Error,
}

impl SyncStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "error" => Self::Error,
            _ => Self::Synced,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }
}

/// Event attendee as reported by the provider. Order is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    pub display_name: Option<String>,
    pub response_status: Option<String>,
}

/// Persisted mirror of one remote calendar event.
///
/// Identity is (user_email, calendar_id, remote_event_id). `etag` together
/// with `last_modified` lets a consumer detect staleness of a locally-held
/// copy without re-fetching the full event body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEvent {
    pub user_email: String,
    pub calendar_id: String,
    pub remote_event_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: EventStatus,
    pub attendees: Vec<Attendee>,
    pub is_recurring: bool,
    /// Back-reference to the recurring series master, not ownership.
    pub recurring_event_id: Option<String>,
    /// Opaque concurrency token from the provider.
    pub etag: Option<String>,
    /// Remote-reported last modification time.
    pub last_modified: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    pub conflict_detected: bool,
    /// Weak reference to an internally-tracked shoot record. Informational
    /// only; deleting the shoot must not cascade to this row.
    pub shoot_id: Option<String>,
}

/// Opaque incremental-sync position, one per (user_email, calendar_id).
///
/// A cursor is valid only for the calendar it was issued for. Presenting it
/// to the wrong calendar, or after the provider invalidated it, must be
/// treated as expired and forces a full resync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    pub user_email: String,
    pub calendar_id: String,
    pub cursor: String,
    pub last_synced_at: DateTime<Utc>,
}

/// Push-notification subscription registered with the remote provider.
///
/// At most one row per (user_email, calendar_id) may be `active` at any
/// time; superseded channels are deactivated but retained for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookChannel {
    pub channel_id: String,
    pub user_email: String,
    pub calendar_id: String,
    pub resource_id: String,
    pub resource_uri: String,
    pub verification_token: Option<String>,
    pub expiration: DateTime<Utc>,
    pub active: bool,
}

impl WebhookChannel {
    /// Whether the channel's expiration has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

/// Result of a conflict check against a candidate interval. Derived, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    pub has_conflict: bool,
    pub conflicting_events: Vec<CachedEvent>,
}

impl ConflictInfo {
    pub fn none() -> Self {
        Self { has_conflict: false, conflicting_events: Vec::new() }
    }
}

/// Counters accumulated over one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub synced_count: usize,
    pub deleted_count: usize,
    pub conflict_count: usize,
    pub next_cursor: Option<String>,
}

/// Top-level result of `sync_calendar`: success with counts, or a single
/// classified error summarizing the run's failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,
    pub synced_count: usize,
    pub deleted_count: usize,
    pub conflict_count: usize,
    pub next_cursor: Option<String>,
    pub error: Option<String>,
}

impl SyncReport {
    pub fn success(outcome: SyncOutcome) -> Self {
        Self {
            success: true,
            synced_count: outcome.synced_count,
            deleted_count: outcome.deleted_count,
            conflict_count: outcome.conflict_count,
            next_cursor: outcome.next_cursor,
            error: None,
        }
    }

    pub fn failure(error: &crate::ShotFlowError) -> Self {
        Self {
            success: false,
            synced_count: 0,
            deleted_count: 0,
            conflict_count: 0,
            next_cursor: None,
            error: Some(error.to_string()),
        }
    }
}

/// OAuth-style credential for one user + provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Whether the access token expires within `buffer_secs` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, buffer_secs: i64) -> bool {
        self.expires_at <= now + chrono::Duration::seconds(buffer_secs)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn event_status_parse_round_trip() {
        assert_eq!(EventStatus::parse("cancelled"), EventStatus::Cancelled);
        assert_eq!(EventStatus::parse("tentative"), EventStatus::Tentative);
        assert_eq!(EventStatus::parse("confirmed"), EventStatus::Confirmed);
        // Unknown vendor statuses default to confirmed
        assert_eq!(EventStatus::parse("workingElsewhere"), EventStatus::Confirmed);
        assert_eq!(EventStatus::parse(EventStatus::Cancelled.as_str()), EventStatus::Cancelled);
    }

    #[test]
    fn credential_refresh_buffer() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let cred = Credential {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at: now + chrono::Duration::seconds(120),
        };

        assert!(cred.expires_within(now, 300));
        assert!(!cred.expires_within(now, 60));
    }

    #[test]
    fn channel_expiry() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let channel = WebhookChannel {
            channel_id: "ch-1".into(),
            user_email: "user@example.com".into(),
            calendar_id: "primary".into(),
            resource_id: "res-1".into(),
            resource_uri: "https://example.com/res-1".into(),
            verification_token: None,
            expiration: now,
            active: true,
        };

        assert!(channel.is_expired(now));
        assert!(!channel.is_expired(now - chrono::Duration::seconds(1)));
    }
}
