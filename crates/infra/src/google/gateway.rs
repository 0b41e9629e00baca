//! Google Calendar implementation of the CalendarGateway port.
//!
//! Thin transport wrapper over the Calendar v3 REST API and the OAuth token
//! endpoint. Responses are classified into the domain error taxonomy here so
//! the core never inspects HTTP status codes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use shotflow_core::calendar::ports::{
    CalendarGateway, ChannelRegistration, EventDraft, EventPage, ListEventsQuery,
    RefreshedCredential, RemoteEvent,
};
use shotflow_domain::{Attendee, Credential, EventStatus, Result, ShotFlowError};
use tracing::{debug, instrument, warn};

use crate::errors::InfraError;

const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const PAGE_SIZE: u32 = 250;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Google Calendar gateway.
pub struct GoogleCalendarGateway {
    client: Client,
    api_base: String,
    token_url: String,
    oauth_client: Option<(String, String)>,
}

impl GoogleCalendarGateway {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ShotFlowError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            api_base: GOOGLE_CALENDAR_API_BASE.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            oauth_client: None,
        })
    }

    /// Point the gateway at a different API host (tests).
    pub fn with_base_urls(
        mut self,
        api_base: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.token_url = token_url.into();
        self
    }

    /// Provide the OAuth client pair directly instead of reading it from the
    /// environment.
    pub fn with_oauth_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.oauth_client = Some((client_id.into(), client_secret.into()));
        self
    }

    fn oauth_client(&self) -> Result<(String, String)> {
        if let Some(pair) = &self.oauth_client {
            return Ok(pair.clone());
        }
        let client_id = std::env::var("GOOGLE_CALENDAR_CLIENT_ID").map_err(|_| {
            ShotFlowError::Config("GOOGLE_CALENDAR_CLIENT_ID not set".into())
        })?;
        let client_secret = std::env::var("GOOGLE_CALENDAR_CLIENT_SECRET").map_err(|_| {
            ShotFlowError::Config("GOOGLE_CALENDAR_CLIENT_SECRET not set".into())
        })?;
        Ok((client_id, client_secret))
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}/events", self.api_base, calendar_id)
    }

    /// Fold a non-success response into the domain taxonomy.
    async fn classify_failure(response: Response) -> ShotFlowError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        classify_status(status, &body)
    }
}

/// Map a Google API status code and error body to the error taxonomy.
fn classify_status(status: StatusCode, body: &str) -> ShotFlowError {
    match status {
        StatusCode::UNAUTHORIZED => ShotFlowError::Auth(format!("unauthorized: {body}")),
        StatusCode::FORBIDDEN if is_rate_limit_body(body) => {
            ShotFlowError::RateLimited(format!("quota exceeded: {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => ShotFlowError::RateLimited(format!("429: {body}")),
        StatusCode::GONE => ShotFlowError::CursorExpired("sync token no longer valid".into()),
        StatusCode::NOT_FOUND => ShotFlowError::NotFound(format!("resource not found: {body}")),
        StatusCode::PRECONDITION_FAILED => {
            ShotFlowError::Conflict(format!("etag precondition failed: {body}"))
        }
        status if status.is_server_error() => {
            ShotFlowError::TransientServer(format!("{status}: {body}"))
        }
        status => ShotFlowError::Validation(format!("{status}: {body}")),
    }
}

/// Google reports some quota failures as 403 with a distinguishing reason.
fn is_rate_limit_body(body: &str) -> bool {
    body.contains("rateLimitExceeded")
        || body.contains("userRateLimitExceeded")
        || body.contains("quotaExceeded")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
    next_sync_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: Option<String>,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<GoogleEventTime>,
    end: Option<GoogleEventTime>,
    #[serde(default)]
    attendees: Vec<GoogleAttendee>,
    recurring_event_id: Option<String>,
    etag: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    date_time: Option<String>,
    /// Set instead of `dateTime` for all-day events.
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAttendee {
    email: Option<String>,
    display_name: Option<String>,
    response_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleChannelResponse {
    id: String,
    resource_id: String,
    resource_uri: String,
    /// Epoch milliseconds, serialized as a string.
    expiration: Option<String>,
}

fn parse_event_time(time: &GoogleEventTime) -> Option<DateTime<Utc>> {
    if let Some(date_time) = &time.date_time {
        return DateTime::parse_from_rfc3339(date_time).ok().map(|dt| dt.with_timezone(&Utc));
    }
    // All-day events carry a bare date; pinned to midnight UTC.
    let date = time.date.as_deref()?;
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(parsed.and_time(NaiveTime::MIN).and_utc())
}

fn map_event(event: GoogleEvent) -> RemoteEvent {
    let start_time = event.start.as_ref().and_then(parse_event_time);
    let end_time = event.end.as_ref().and_then(parse_event_time);
    let last_modified = event
        .updated
        .as_deref()
        .and_then(|u| DateTime::parse_from_rfc3339(u).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let attendees = event
        .attendees
        .into_iter()
        .filter_map(|a| {
            let email = a.email?;
            if !email.contains('@') {
                warn!(email, "dropping attendee with malformed email");
                return None;
            }
            Some(Attendee {
                email,
                display_name: a.display_name,
                response_status: a.response_status,
            })
        })
        .collect();

    RemoteEvent {
        id: event.id,
        title: event.summary.filter(|s| !s.trim().is_empty()),
        description: event.description,
        location: event.location,
        start_time,
        end_time,
        status: event.status.as_deref().map(EventStatus::parse),
        attendees,
        recurring_event_id: event.recurring_event_id,
        etag: event.etag,
        last_modified,
    }
}

fn draft_to_body(draft: &EventDraft) -> serde_json::Value {
    json!({
        "summary": draft.title,
        "description": draft.description,
        "location": draft.location,
        "start": { "dateTime": draft.start_time.to_rfc3339() },
        "end": { "dateTime": draft.end_time.to_rfc3339() },
        "attendees": draft
            .attendees
            .iter()
            .map(|a| json!({ "email": a.email, "displayName": a.display_name }))
            .collect::<Vec<_>>(),
    })
}

fn parse_channel_expiration(raw: Option<&str>) -> Result<DateTime<Utc>> {
    let millis: i64 = raw
        .ok_or_else(|| ShotFlowError::Internal("watch response missing expiration".into()))?
        .parse()
        .map_err(|e| ShotFlowError::Internal(format!("invalid channel expiration: {e}")))?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ShotFlowError::Internal(format!("channel expiration {millis} out of range")))
}

#[async_trait]
impl CalendarGateway for GoogleCalendarGateway {
    #[instrument(skip(self, credential, query), fields(has_cursor = query.cursor.is_some()))]
    async fn list_events(
        &self,
        credential: &Credential,
        calendar_id: &str,
        query: &ListEventsQuery,
    ) -> Result<EventPage> {
        let mut params: Vec<(&str, String)> =
            vec![("maxResults", PAGE_SIZE.to_string()), ("singleEvents", "true".into())];

        if let Some(cursor) = &query.cursor {
            // syncToken cannot be combined with a time window or ordering.
            params.push(("syncToken", cursor.clone()));
        } else {
            if let Some(time_min) = query.time_min {
                params.push(("timeMin", time_min.to_rfc3339()));
            }
            if let Some(time_max) = query.time_max {
                params.push(("timeMax", time_max.to_rfc3339()));
            }
            params.push(("orderBy", "startTime".into()));
        }
        if let Some(page_token) = &query.page_token {
            params.push(("pageToken", page_token.clone()));
        }

        let response = self
            .client
            .get(self.events_url(calendar_id))
            .bearer_auth(&credential.access_token)
            .query(&params)
            .send()
            .await
            .map_err(InfraError::from)?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }

        let body: GoogleEventsResponse = response.json().await.map_err(InfraError::from)?;
        debug!(
            items = body.items.len(),
            has_next_page = body.next_page_token.is_some(),
            has_sync_token = body.next_sync_token.is_some(),
            "fetched events page"
        );

        Ok(EventPage {
            events: body.items.into_iter().map(map_event).collect(),
            next_page_token: body.next_page_token,
            next_cursor: body.next_sync_token,
        })
    }

    #[instrument(skip(self, credential))]
    async fn get_event(
        &self,
        credential: &Credential,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<Option<RemoteEvent>> {
        let response = self
            .client
            .get(format!("{}/{}", self.events_url(calendar_id), event_id))
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(InfraError::from)?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => return Ok(None),
            status if !status.is_success() => return Err(Self::classify_failure(response).await),
            _ => {}
        }

        let event: GoogleEvent = response.json().await.map_err(InfraError::from)?;
        // Google serves deleted events with status "cancelled" instead of 404.
        if event.status.as_deref() == Some("cancelled") {
            return Ok(None);
        }
        Ok(Some(map_event(event)))
    }

    #[instrument(skip(self, credential, draft), fields(title = %draft.title))]
    async fn create_event(
        &self,
        credential: &Credential,
        calendar_id: &str,
        draft: &EventDraft,
    ) -> Result<RemoteEvent> {
        draft.validate()?;

        let response = self
            .client
            .post(self.events_url(calendar_id))
            .bearer_auth(&credential.access_token)
            .json(&draft_to_body(draft))
            .send()
            .await
            .map_err(InfraError::from)?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }

        let event: GoogleEvent = response.json().await.map_err(InfraError::from)?;
        Ok(map_event(event))
    }

    #[instrument(skip(self, credential, draft))]
    async fn update_event(
        &self,
        credential: &Credential,
        calendar_id: &str,
        event_id: &str,
        draft: &EventDraft,
        etag_precondition: Option<&str>,
    ) -> Result<RemoteEvent> {
        draft.validate()?;

        let mut request = self
            .client
            .put(format!("{}/{}", self.events_url(calendar_id), event_id))
            .bearer_auth(&credential.access_token)
            .json(&draft_to_body(draft));

        if let Some(etag) = etag_precondition {
            request = request.header(reqwest::header::IF_MATCH, etag);
        }

        let response = request.send().await.map_err(InfraError::from)?;
        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }

        let event: GoogleEvent = response.json().await.map_err(InfraError::from)?;
        Ok(map_event(event))
    }

    #[instrument(skip(self, credential))]
    async fn delete_event(
        &self,
        credential: &Credential,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/{}", self.events_url(calendar_id), event_id))
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(InfraError::from)?;

        // An event already gone remotely is a successful delete.
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                debug!(event_id, "event already absent remotely");
                Ok(())
            }
            status if status.is_success() => Ok(()),
            _ => Err(Self::classify_failure(response).await),
        }
    }

    #[instrument(skip(self, credential, callback_url))]
    async fn create_channel(
        &self,
        credential: &Credential,
        calendar_id: &str,
        channel_id: &str,
        callback_url: &str,
    ) -> Result<ChannelRegistration> {
        let response = self
            .client
            .post(format!("{}/watch", self.events_url(calendar_id)))
            .bearer_auth(&credential.access_token)
            .json(&json!({
                "id": channel_id,
                "type": "web_hook",
                "address": callback_url,
            }))
            .send()
            .await
            .map_err(InfraError::from)?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }

        let body: GoogleChannelResponse = response.json().await.map_err(InfraError::from)?;
        Ok(ChannelRegistration {
            channel_id: body.id,
            resource_id: body.resource_id,
            resource_uri: body.resource_uri,
            expiration: parse_channel_expiration(body.expiration.as_deref())?,
        })
    }

    #[instrument(skip(self, credential))]
    async fn stop_channel(
        &self,
        credential: &Credential,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/channels/stop", self.api_base))
            .bearer_auth(&credential.access_token)
            .json(&json!({ "id": channel_id, "resourceId": resource_id }))
            .send()
            .await
            .map_err(InfraError::from)?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }
        Ok(())
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh_credential(&self, refresh_token: &str) -> Result<RefreshedCredential> {
        let (client_id, client_secret) = self.oauth_client()?;

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(InfraError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ShotFlowError::Auth(format!("token refresh failed ({status}): {body}")));
        }

        let token: GoogleTokenResponse = response.json().await.map_err(InfraError::from)?;
        Ok(RefreshedCredential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in_secs: token.expires_in,
        })
    }
}
