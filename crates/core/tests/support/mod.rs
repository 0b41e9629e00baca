//! In-memory test doubles for the calendar ports.
//!
//! The gateway is scripted: tests enqueue the responses `list_events` and
//! `refresh_credential` should return, in order. The repositories are plain
//! maps behind mutexes so assertions can inspect persisted state directly.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use shotflow_core::calendar::ports::{
    CalendarGateway, ChannelRegistration, CredentialStore, EventCacheRepository, EventDraft,
    EventPage, ListEventsQuery, RefreshedCredential, RemoteEvent, ShootLink, ShootStore,
    SyncCursorRepository, WebhookChannelRepository,
};
use shotflow_core::CredentialService;
use shotflow_domain::{
    CachedEvent, Credential, EventStatus, Result, ShotFlowError, SyncCursor, SyncStatus,
    WebhookChannel,
};

pub const USER: &str = "ava@example.com";
pub const CALENDAR: &str = "primary";
pub const PROVIDER: &str = shotflow_domain::constants::PROVIDER_GOOGLE;

pub fn ts(hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, hour, min, 0).single().expect("valid timestamp")
}

pub fn valid_credential() -> Credential {
    Credential {
        access_token: "token-1".into(),
        refresh_token: Some("refresh-1".into()),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

pub fn expiring_credential() -> Credential {
    Credential {
        access_token: "token-stale".into(),
        refresh_token: Some("refresh-1".into()),
        expires_at: Utc::now() + Duration::seconds(60),
    }
}

pub fn remote_event(id: &str, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> RemoteEvent {
    RemoteEvent {
        id: Some(id.into()),
        title: Some(title.into()),
        start_time: Some(start),
        end_time: Some(end),
        status: Some(EventStatus::Confirmed),
        etag: Some(format!("etag-{id}")),
        ..RemoteEvent::default()
    }
}

pub fn cancelled_event(id: &str) -> RemoteEvent {
    RemoteEvent {
        id: Some(id.into()),
        status: Some(EventStatus::Cancelled),
        ..RemoteEvent::default()
    }
}

pub fn cached_event(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CachedEvent {
    CachedEvent {
        user_email: USER.into(),
        calendar_id: CALENDAR.into(),
        remote_event_id: id.into(),
        title: format!("event {id}"),
        description: None,
        location: None,
        start_time: start,
        end_time: end,
        status: EventStatus::Confirmed,
        attendees: Vec::new(),
        is_recurring: false,
        recurring_event_id: None,
        etag: None,
        last_modified: None,
        sync_status: SyncStatus::Synced,
        conflict_detected: false,
        shoot_id: None,
    }
}

/// Scripted gateway double. Responses are consumed in FIFO order; running
/// out of scripted pages is a test bug and fails loudly.
#[derive(Default)]
pub struct MockGateway {
    pub pages: Mutex<VecDeque<Result<EventPage>>>,
    pub list_queries: Mutex<Vec<ListEventsQuery>>,
    pub list_tokens_seen: Mutex<Vec<String>>,
    pub remote_events: Mutex<HashMap<String, RemoteEvent>>,
    pub refresh_results: Mutex<VecDeque<Result<RefreshedCredential>>>,
    pub refresh_calls: Mutex<u32>,
    pub channel_results: Mutex<VecDeque<Result<ChannelRegistration>>>,
    pub stopped_channels: Mutex<Vec<String>>,
    pub stop_result: Mutex<Option<ShotFlowError>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&self, page: EventPage) {
        self.pages.lock().expect("lock").push_back(Ok(page));
    }

    pub fn push_error(&self, error: ShotFlowError) {
        self.pages.lock().expect("lock").push_back(Err(error));
    }

    pub fn push_refresh(&self, result: Result<RefreshedCredential>) {
        self.refresh_results.lock().expect("lock").push_back(result);
    }

    pub fn push_channel(&self, registration: ChannelRegistration) {
        self.channel_results.lock().expect("lock").push_back(Ok(registration));
    }
}

#[async_trait]
impl CalendarGateway for MockGateway {
    async fn list_events(
        &self,
        credential: &Credential,
        _calendar_id: &str,
        query: &ListEventsQuery,
    ) -> Result<EventPage> {
        self.list_tokens_seen.lock().expect("lock").push(credential.access_token.clone());
        self.list_queries.lock().expect("lock").push(query.clone());
        self.pages
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted page for query {query:?}"))
    }

    async fn get_event(
        &self,
        _credential: &Credential,
        _calendar_id: &str,
        event_id: &str,
    ) -> Result<Option<RemoteEvent>> {
        Ok(self.remote_events.lock().expect("lock").get(event_id).cloned())
    }

    async fn create_event(
        &self,
        _credential: &Credential,
        _calendar_id: &str,
        draft: &EventDraft,
    ) -> Result<RemoteEvent> {
        Ok(remote_event("created", &draft.title, draft.start_time, draft.end_time))
    }

    async fn update_event(
        &self,
        _credential: &Credential,
        _calendar_id: &str,
        event_id: &str,
        draft: &EventDraft,
        _etag_precondition: Option<&str>,
    ) -> Result<RemoteEvent> {
        Ok(remote_event(event_id, &draft.title, draft.start_time, draft.end_time))
    }

    async fn delete_event(
        &self,
        _credential: &Credential,
        _calendar_id: &str,
        _event_id: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn create_channel(
        &self,
        _credential: &Credential,
        _calendar_id: &str,
        channel_id: &str,
        _callback_url: &str,
    ) -> Result<ChannelRegistration> {
        self.channel_results.lock().expect("lock").pop_front().unwrap_or_else(|| {
            Ok(ChannelRegistration {
                channel_id: channel_id.to_string(),
                resource_id: format!("res-{channel_id}"),
                resource_uri: "https://www.googleapis.com/calendar/v3/calendars/primary/events"
                    .into(),
                expiration: Utc::now() + Duration::days(7),
            })
        })
    }

    async fn stop_channel(
        &self,
        _credential: &Credential,
        channel_id: &str,
        _resource_id: &str,
    ) -> Result<()> {
        self.stopped_channels.lock().expect("lock").push(channel_id.to_string());
        match self.stop_result.lock().expect("lock").clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn refresh_credential(&self, _refresh_token: &str) -> Result<RefreshedCredential> {
        *self.refresh_calls.lock().expect("lock") += 1;
        self.refresh_results
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted refresh result"))
    }
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    pub credentials: Mutex<HashMap<(String, String), Credential>>,
}

impl InMemoryCredentialStore {
    pub fn with_credential(credential: Credential) -> Self {
        let store = Self::default();
        store
            .credentials
            .lock()
            .expect("lock")
            .insert((USER.to_string(), PROVIDER.to_string()), credential);
        store
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, user_email: &str, provider: &str) -> Result<Option<Credential>> {
        Ok(self
            .credentials
            .lock()
            .expect("lock")
            .get(&(user_email.to_string(), provider.to_string()))
            .cloned())
    }

    async fn upsert(
        &self,
        user_email: &str,
        provider: &str,
        credential: &Credential,
    ) -> Result<()> {
        self.credentials
            .lock()
            .expect("lock")
            .insert((user_email.to_string(), provider.to_string()), credential.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEventCache {
    pub events: Mutex<Vec<CachedEvent>>,
}

impl InMemoryEventCache {
    pub fn with_events(events: Vec<CachedEvent>) -> Self {
        Self { events: Mutex::new(events) }
    }

    pub fn snapshot(&self) -> Vec<CachedEvent> {
        self.events.lock().expect("lock").clone()
    }
}

#[async_trait]
impl EventCacheRepository for InMemoryEventCache {
    async fn upsert_event(&self, event: &CachedEvent) -> Result<()> {
        let mut events = self.events.lock().expect("lock");
        if let Some(existing) = events.iter_mut().find(|e| {
            e.user_email == event.user_email
                && e.calendar_id == event.calendar_id
                && e.remote_event_id == event.remote_event_id
        }) {
            let shoot_id = existing.shoot_id.take();
            *existing = event.clone();
            existing.shoot_id = shoot_id;
        } else {
            events.push(event.clone());
        }
        Ok(())
    }

    async fn delete_event(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
    ) -> Result<bool> {
        let mut events = self.events.lock().expect("lock");
        let before = events.len();
        events.retain(|e| {
            !(e.user_email == user_email
                && e.calendar_id == calendar_id
                && e.remote_event_id == remote_event_id)
        });
        Ok(events.len() < before)
    }

    async fn get_event(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
    ) -> Result<Option<CachedEvent>> {
        Ok(self
            .events
            .lock()
            .expect("lock")
            .iter()
            .find(|e| {
                e.user_email == user_email
                    && e.calendar_id == calendar_id
                    && e.remote_event_id == remote_event_id
            })
            .cloned())
    }

    async fn list_events(&self, user_email: &str, calendar_id: &str) -> Result<Vec<CachedEvent>> {
        let mut events: Vec<CachedEvent> = self
            .events
            .lock()
            .expect("lock")
            .iter()
            .filter(|e| e.user_email == user_email && e.calendar_id == calendar_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start_time);
        Ok(events)
    }

    async fn clear_calendar(&self, user_email: &str, calendar_id: &str) -> Result<usize> {
        let mut events = self.events.lock().expect("lock");
        let before = events.len();
        events.retain(|e| !(e.user_email == user_email && e.calendar_id == calendar_id));
        Ok(before - events.len())
    }

    async fn set_conflict_state(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
        in_conflict: bool,
    ) -> Result<()> {
        let mut events = self.events.lock().expect("lock");
        if let Some(event) = events.iter_mut().find(|e| {
            e.user_email == user_email
                && e.calendar_id == calendar_id
                && e.remote_event_id == remote_event_id
        }) {
            event.conflict_detected = in_conflict;
            event.sync_status = if in_conflict { SyncStatus::Error } else { SyncStatus::Synced };
        }
        Ok(())
    }

    async fn set_shoot_link(
        &self,
        user_email: &str,
        calendar_id: &str,
        remote_event_id: &str,
        shoot_id: Option<&str>,
    ) -> Result<()> {
        let mut events = self.events.lock().expect("lock");
        if let Some(event) = events.iter_mut().find(|e| {
            e.user_email == user_email
                && e.calendar_id == calendar_id
                && e.remote_event_id == remote_event_id
        }) {
            event.shoot_id = shoot_id.map(str::to_string);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCursorRepo {
    pub cursors: Mutex<HashMap<(String, String), SyncCursor>>,
}

impl InMemoryCursorRepo {
    pub fn with_cursor(cursor: &str) -> Self {
        let repo = Self::default();
        repo.cursors.lock().expect("lock").insert(
            (USER.to_string(), CALENDAR.to_string()),
            SyncCursor {
                user_email: USER.into(),
                calendar_id: CALENDAR.into(),
                cursor: cursor.into(),
                last_synced_at: Utc::now(),
            },
        );
        repo
    }

    pub fn stored(&self) -> Option<String> {
        self.cursors
            .lock()
            .expect("lock")
            .get(&(USER.to_string(), CALENDAR.to_string()))
            .map(|c| c.cursor.clone())
    }
}

#[async_trait]
impl SyncCursorRepository for InMemoryCursorRepo {
    async fn get(&self, user_email: &str, calendar_id: &str) -> Result<Option<SyncCursor>> {
        Ok(self
            .cursors
            .lock()
            .expect("lock")
            .get(&(user_email.to_string(), calendar_id.to_string()))
            .cloned())
    }

    async fn upsert(&self, cursor: &SyncCursor) -> Result<()> {
        self.cursors
            .lock()
            .expect("lock")
            .insert((cursor.user_email.clone(), cursor.calendar_id.clone()), cursor.clone());
        Ok(())
    }

    async fn delete(&self, user_email: &str, calendar_id: &str) -> Result<()> {
        self.cursors
            .lock()
            .expect("lock")
            .remove(&(user_email.to_string(), calendar_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryChannelRepo {
    pub channels: Mutex<Vec<WebhookChannel>>,
}

impl InMemoryChannelRepo {
    pub fn snapshot(&self) -> Vec<WebhookChannel> {
        self.channels.lock().expect("lock").clone()
    }
}

#[async_trait]
impl WebhookChannelRepository for InMemoryChannelRepo {
    async fn insert(&self, channel: &WebhookChannel) -> Result<()> {
        self.channels.lock().expect("lock").push(channel.clone());
        Ok(())
    }

    async fn find_by_channel_id(&self, channel_id: &str) -> Result<Option<WebhookChannel>> {
        Ok(self
            .channels
            .lock()
            .expect("lock")
            .iter()
            .find(|c| c.channel_id == channel_id)
            .cloned())
    }

    async fn find_active(
        &self,
        user_email: &str,
        calendar_id: &str,
    ) -> Result<Option<WebhookChannel>> {
        Ok(self
            .channels
            .lock()
            .expect("lock")
            .iter()
            .find(|c| c.active && c.user_email == user_email && c.calendar_id == calendar_id)
            .cloned())
    }

    async fn deactivate(&self, channel_id: &str) -> Result<bool> {
        let mut channels = self.channels.lock().expect("lock");
        match channels.iter_mut().find(|c| c.channel_id == channel_id && c.active) {
            Some(channel) => {
                channel.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<WebhookChannel>> {
        Ok(self
            .channels
            .lock()
            .expect("lock")
            .iter()
            .filter(|c| c.active && c.is_expired(now))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryShootStore {
    pub links: Mutex<Vec<ShootLink>>,
    pub cleared: Mutex<Vec<(String, String)>>,
}

impl InMemoryShootStore {
    pub fn with_link(shoot_id: &str, remote_event_id: &str) -> Self {
        let store = Self::default();
        store.links.lock().expect("lock").push(ShootLink {
            shoot_id: shoot_id.into(),
            remote_event_id: Some(remote_event_id.into()),
            calendar_id: Some(CALENDAR.into()),
        });
        store
    }

    pub fn cleared_reasons(&self) -> Vec<(String, String)> {
        self.cleared.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ShootStore for InMemoryShootStore {
    async fn find_by_remote_event(&self, remote_event_id: &str) -> Result<Option<ShootLink>> {
        Ok(self
            .links
            .lock()
            .expect("lock")
            .iter()
            .find(|l| l.remote_event_id.as_deref() == Some(remote_event_id))
            .cloned())
    }

    async fn clear_calendar_link(&self, shoot_id: &str, reason: &str) -> Result<()> {
        let mut links = self.links.lock().expect("lock");
        if let Some(link) = links.iter_mut().find(|l| l.shoot_id == shoot_id) {
            link.remote_event_id = None;
            link.calendar_id = None;
        }
        self.cleared.lock().expect("lock").push((shoot_id.to_string(), reason.to_string()));
        Ok(())
    }

    async fn exists(&self, shoot_id: &str) -> Result<bool> {
        Ok(self.links.lock().expect("lock").iter().any(|l| l.shoot_id == shoot_id))
    }
}

/// Everything a sync-engine test needs, with handles kept for assertions.
pub struct TestHarness {
    pub gateway: Arc<MockGateway>,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub cache: Arc<InMemoryEventCache>,
    pub cursors: Arc<InMemoryCursorRepo>,
    pub channels: Arc<InMemoryChannelRepo>,
    pub shoots: Arc<InMemoryShootStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            gateway: Arc::new(MockGateway::new()),
            credentials: Arc::new(InMemoryCredentialStore::with_credential(valid_credential())),
            cache: Arc::new(InMemoryEventCache::default()),
            cursors: Arc::new(InMemoryCursorRepo::default()),
            channels: Arc::new(InMemoryChannelRepo::default()),
            shoots: Arc::new(InMemoryShootStore::default()),
        }
    }

    pub fn credential_service(&self) -> Arc<CredentialService> {
        Arc::new(CredentialService::new(
            Arc::clone(&self.credentials) as Arc<dyn CredentialStore>,
            Arc::clone(&self.gateway) as Arc<dyn CalendarGateway>,
            PROVIDER,
        ))
    }

    pub fn engine(&self) -> shotflow_core::SyncEngine {
        shotflow_core::SyncEngine::new(
            Arc::clone(&self.gateway) as Arc<dyn CalendarGateway>,
            self.credential_service(),
            Arc::clone(&self.cache) as Arc<dyn EventCacheRepository>,
            Arc::clone(&self.cursors) as Arc<dyn SyncCursorRepository>,
            Arc::clone(&self.shoots) as Arc<dyn ShootStore>,
        )
        .with_retry_config(shotflow_common::resilience::RetryConfig::fixed(
            5,
            std::time::Duration::from_millis(1),
        ))
    }

    pub fn channel_service(&self) -> shotflow_core::ChannelService {
        shotflow_core::ChannelService::new(
            Arc::clone(&self.gateway) as Arc<dyn CalendarGateway>,
            self.credential_service(),
            Arc::clone(&self.channels) as Arc<dyn WebhookChannelRepository>,
            "https://shotflow.example.com/webhooks/calendar",
        )
    }
}
