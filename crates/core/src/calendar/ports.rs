//! Calendar sync port interfaces.
//!
//! Every external collaborator of the sync engine sits behind one of these
//! traits: the remote provider gateway, the credential store, and the
//! persistence adapters for the event cache, sync cursors, webhook channels
//! and internally-tracked shoot records. Infra provides the production
//! implementations; tests use in-memory mocks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shotflow_domain::{
    Attendee, CachedEvent, Credential, EventStatus, Result, ShotFlowError, SyncCursor,
    WebhookChannel,
};

/// One event as reported by the provider's change feed, before validation.
///
/// Providers emit placeholder items with missing ids or times; the engine
/// decides what to skip, so every field the feed may omit is optional here.
#[derive(Debug, Clone, Default)]
pub struct RemoteEvent {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub attendees: Vec<Attendee>,
    pub recurring_event_id: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl RemoteEvent {
    /// Whether the item reports a cancellation/deletion.
    pub fn is_cancelled(&self) -> bool {
        self.status == Some(EventStatus::Cancelled)
    }
}

/// One page of the remote change feed.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<RemoteEvent>,
    /// Provider pagination token; present while more pages remain.
    pub next_page_token: Option<String>,
    /// Incremental sync cursor, supplied on the final page of a sequence.
    pub next_cursor: Option<String>,
}

/// Query parameters for a change-feed fetch.
///
/// Exactly one of `cursor` (incremental) or the `time_min`/`time_max` window
/// (full sync) is set; `page_token` continues a page sequence either way.
#[derive(Debug, Clone, Default)]
pub struct ListEventsQuery {
    pub time_min: Option<DateTime<Utc>>,
    pub time_max: Option<DateTime<Utc>>,
    pub cursor: Option<String>,
    pub page_token: Option<String>,
}

/// Outbound event payload for create/update calls.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendees: Vec<Attendee>,
}

impl EventDraft {
    /// Reject malformed drafts before any network call is made.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ShotFlowError::Validation("event title must not be empty".into()));
        }
        if self.end_time <= self.start_time {
            return Err(ShotFlowError::Validation(
                "event end time must be after start time".into(),
            ));
        }
        Ok(())
    }
}

/// Result of registering a push-notification channel with the provider.
#[derive(Debug, Clone)]
pub struct ChannelRegistration {
    pub channel_id: String,
    pub resource_id: String,
    pub resource_uri: String,
    pub expiration: DateTime<Utc>,
}

/// Token set returned by the provider's refresh flow.
#[derive(Debug, Clone)]
pub struct RefreshedCredential {
    pub access_token: String,
    /// Present only when the provider reissues the refresh token.
    pub refresh_token: Option<String>,
    pub expires_in_secs: i64,
}

/// Remote calendar provider boundary.
///
/// Credentials are passed per call as immutable values; implementations must
/// never keep mutable auth state shared across call paths.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Fetch one page of the change feed.
    async fn list_events(
        &self,
        credential: &Credential,
        calendar_id: &str,
        query: &ListEventsQuery,
    ) -> Result<EventPage>;

    /// Fetch a single event; `Ok(None)` when the remote reports it gone.
    async fn get_event(
        &self,
        credential: &Credential,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<Option<RemoteEvent>>;

    async fn create_event(
        &self,
        credential: &Credential,
        calendar_id: &str,
        draft: &EventDraft,
    ) -> Result<RemoteEvent>;

    /// Update an event, optionally guarded by an etag precondition. A stale
    /// etag yields `ShotFlowError::Conflict`.
    async fn update_event(
        &self,
        credential: &Credential,
        calendar_id: &str,
        event_id: &str,
        draft: &EventDraft,
        etag_precondition: Option<&str>,
    ) -> Result<RemoteEvent>;

    /// Delete an event. A remote `NotFound` is treated as success by callers.
    async fn delete_event(
        &self,
        credential: &Credential,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<()>;

    /// Register a push-notification channel for the calendar.
    async fn create_channel(
        &self,
        credential: &Credential,
        calendar_id: &str,
        channel_id: &str,
        callback_url: &str,
    ) -> Result<ChannelRegistration>;

    /// Stop a push-notification channel.
    async fn stop_channel(
        &self,
        credential: &Credential,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<()>;

    /// Exchange a refresh token for a fresh access token.
    async fn refresh_credential(&self, refresh_token: &str) -> Result<RefreshedCredential>;
}

/// Credential store boundary (external collaborator).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, user_email: &str, provider: &str) -> Result<Option<Credential>>;
    async fn upsert(&self, user_email: &str, provider: &str, credential: &Credential)
        -> Result<()>;
}

/// Local event cache persistence boundary.
#[async_trait]
pub trait EventCacheRepository: Send + Sync {
    /// Insert or update by (user_email, calendar_id, remote_event_id).
    /// An update must preserve an existing shoot link.
    async fn upsert_event(&self, event: &CachedEvent) -> Result<()>;

    /// Remove one cached event. Returns whether a row existed.
    async fn delete_event(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
    ) -> Result<bool>;

    async fn get_event(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
    ) -> Result<Option<CachedEvent>>;

    /// All cached events for one (user, calendar), ordered by start time.
    async fn list_events(&self, user_email: &str, calendar_id: &str) -> Result<Vec<CachedEvent>>;

    /// Drop every cached event for the calendar. Returns rows removed.
    async fn clear_calendar(&self, user_email: &str, calendar_id: &str) -> Result<usize>;

    /// Persist the outcome of a conflict pass for one event: sets
    /// `conflict_detected` and the matching sync status.
    async fn set_conflict_state(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
        in_conflict: bool,
    ) -> Result<()>;

    /// Attach or detach the weak shoot reference on a cached event.
    async fn set_shoot_link(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
        shoot_id: Option<&str>,
    ) -> Result<()>;
}

/// Sync cursor persistence boundary.
#[async_trait]
pub trait SyncCursorRepository: Send + Sync {
    async fn get(&self, user_email: &str, calendar_id: &str) -> Result<Option<SyncCursor>>;
    async fn upsert(&self, cursor: &SyncCursor) -> Result<()>;
    /// Delete the stored cursor, forcing the next sync to be a full resync.
    async fn delete(&self, user_email: &str, calendar_id: &str) -> Result<()>;
}

/// Webhook channel persistence boundary.
#[async_trait]
pub trait WebhookChannelRepository: Send + Sync {
    async fn insert(&self, channel: &WebhookChannel) -> Result<()>;
    async fn find_by_channel_id(&self, channel_id: &str) -> Result<Option<WebhookChannel>>;
    async fn find_active(
        &self,
        user_email: &str,
        calendar_id: &str,
    ) -> Result<Option<WebhookChannel>>;
    /// Mark a channel inactive (rows are retained for audit). Returns whether
    /// a row was updated.
    async fn deactivate(&self, channel_id: &str) -> Result<bool>;
    /// Channels still marked active whose expiration has passed.
    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<WebhookChannel>>;
}

/// Calendar linkage fields of an internally-tracked shoot record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShootLink {
    pub shoot_id: String,
    pub remote_event_id: Option<String>,
    pub calendar_id: Option<String>,
}

/// Internal shoot-record boundary (external collaborator). The sync core
/// only touches each record's calendar linkage fields.
#[async_trait]
pub trait ShootStore: Send + Sync {
    async fn find_by_remote_event(&self, remote_event_id: &str) -> Result<Option<ShootLink>>;
    /// Clear the record's sync linkage and note a human-readable reason.
    async fn clear_calendar_link(&self, shoot_id: &str, reason: &str) -> Result<()>;
    async fn exists(&self, shoot_id: &str) -> Result<bool>;
}
