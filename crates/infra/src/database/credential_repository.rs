//! SQLite-backed implementation of the CredentialStore port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use shotflow_common::storage::SqlitePool;
use shotflow_core::calendar::ports::CredentialStore;
use shotflow_domain::{Credential, Result, ShotFlowError};
use tracing::instrument;

use crate::errors::InfraError;

/// SQLite implementation of CredentialStore.
pub struct SqliteCredentialStore {
    pool: Arc<SqlitePool>,
}

impl SqliteCredentialStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self, user_email: &str, provider: &str) -> Result<Option<Credential>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let result = conn.query_row(
            "SELECT access_token, refresh_token, expires_at FROM credentials
             WHERE user_email = ?1 AND provider = ?2",
            params![user_email, provider],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        );

        match result {
            Ok((access_token, refresh_token, expires)) => {
                let expires_at = DateTime::from_timestamp(expires, 0).ok_or_else(|| {
                    ShotFlowError::Database(format!("credential expiry {expires} out of range"))
                })?;
                Ok(Some(Credential { access_token, refresh_token, expires_at }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    #[instrument(skip(self, credential))]
    async fn upsert(
        &self,
        user_email: &str,
        provider: &str,
        credential: &Credential,
    ) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        // Single upsert so access token, refresh token and expiry always
        // change together.
        conn.execute(
            "INSERT INTO credentials (
                user_email, provider, access_token, refresh_token, expires_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_email, provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            params![
                user_email,
                provider,
                credential.access_token,
                credential.refresh_token,
                credential.expires_at.timestamp(),
                Utc::now().timestamp(),
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }
}
