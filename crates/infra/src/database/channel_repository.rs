//! SQLite-backed implementation of the WebhookChannelRepository port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use shotflow_common::storage::SqlitePool;
use shotflow_core::calendar::ports::WebhookChannelRepository;
use shotflow_domain::{Result, WebhookChannel};
use tracing::instrument;

use crate::errors::InfraError;

/// SQLite implementation of WebhookChannelRepository.
pub struct SqliteWebhookChannelRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteWebhookChannelRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

const CHANNEL_COLUMNS: &str = "channel_id, user_email, calendar_id, resource_id,
    resource_uri, verification_token, expiration_ts, active";

fn row_to_channel(row: &Row<'_>) -> rusqlite::Result<WebhookChannel> {
    let expiration_ts: i64 = row.get(6)?;
    let expiration = DateTime::<Utc>::from_timestamp(expiration_ts, 0).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Integer,
            format!("expiration {expiration_ts} out of range").into(),
        )
    })?;

    Ok(WebhookChannel {
        channel_id: row.get(0)?,
        user_email: row.get(1)?,
        calendar_id: row.get(2)?,
        resource_id: row.get(3)?,
        resource_uri: row.get(4)?,
        verification_token: row.get(5)?,
        expiration,
        active: row.get(7)?,
    })
}

#[async_trait]
impl WebhookChannelRepository for SqliteWebhookChannelRepository {
    #[instrument(skip(self, channel), fields(channel_id = %channel.channel_id))]
    async fn insert(&self, channel: &WebhookChannel) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        conn.execute(
            "INSERT INTO webhook_channels (
                channel_id, user_email, calendar_id, resource_id, resource_uri,
                verification_token, expiration_ts, active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                channel.channel_id,
                channel.user_email,
                channel.calendar_id,
                channel.resource_id,
                channel.resource_uri,
                channel.verification_token,
                channel.expiration.timestamp(),
                channel.active,
                Utc::now().timestamp(),
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    async fn find_by_channel_id(&self, channel_id: &str) -> Result<Option<WebhookChannel>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let result = conn.query_row(
            &format!("SELECT {CHANNEL_COLUMNS} FROM webhook_channels WHERE channel_id = ?1"),
            params![channel_id],
            row_to_channel,
        );

        match result {
            Ok(channel) => Ok(Some(channel)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    async fn find_active(
        &self,
        user_email: &str,
        calendar_id: &str,
    ) -> Result<Option<WebhookChannel>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let result = conn.query_row(
            &format!(
                "SELECT {CHANNEL_COLUMNS} FROM webhook_channels
                 WHERE user_email = ?1 AND calendar_id = ?2 AND active = 1"
            ),
            params![user_email, calendar_id],
            row_to_channel,
        );

        match result {
            Ok(channel) => Ok(Some(channel)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    #[instrument(skip(self))]
    async fn deactivate(&self, channel_id: &str) -> Result<bool> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let updated = conn
            .execute(
                "UPDATE webhook_channels SET active = 0 WHERE channel_id = ?1 AND active = 1",
                params![channel_id],
            )
            .map_err(InfraError::from)?;
        Ok(updated > 0)
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<WebhookChannel>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CHANNEL_COLUMNS} FROM webhook_channels
                 WHERE active = 1 AND expiration_ts <= ?1
                 ORDER BY expiration_ts ASC"
            ))
            .map_err(InfraError::from)?;

        let channels = stmt
            .query_map(params![now.timestamp()], row_to_channel)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(channels)
    }
}
