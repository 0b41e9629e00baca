//! Credential lifecycle for calendar providers.
//!
//! Keeps a valid access token available for the sync engine: tokens within
//! the refresh safety buffer of expiry are refreshed through the gateway and
//! the new token set is persisted atomically. A failed refresh means the
//! user must reconnect the integration, which is surfaced as a distinct
//! error class rather than retried.

use std::sync::Arc;

use chrono::{Duration, Utc};
use shotflow_domain::constants::TOKEN_REFRESH_BUFFER_SECS;
use shotflow_domain::{Credential, Result, ShotFlowError};
use tracing::{debug, info, instrument, warn};

use super::ports::{CalendarGateway, CredentialStore};

/// Credential service for one provider.
pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
    gateway: Arc<dyn CalendarGateway>,
    provider: String,
    refresh_buffer_secs: i64,
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        gateway: Arc<dyn CalendarGateway>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            provider: provider.into(),
            refresh_buffer_secs: TOKEN_REFRESH_BUFFER_SECS,
        }
    }

    /// Override the refresh safety buffer (tests).
    pub fn with_refresh_buffer(mut self, secs: i64) -> Self {
        self.refresh_buffer_secs = secs;
        self
    }

    /// Return a credential guaranteed valid for at least the safety buffer.
    ///
    /// No stored credential at all is a configuration error: the calendar
    /// integration was never connected (or was disconnected) and must be
    /// reconnected by the user.
    #[instrument(skip(self))]
    pub async fn ensure_valid(&self, user_email: &str) -> Result<Credential> {
        let credential =
            self.store.get(user_email, &self.provider).await?.ok_or_else(|| {
                ShotFlowError::Config(format!(
                    "no calendar credentials stored for {user_email}; reconnect the integration"
                ))
            })?;

        if !credential.expires_within(Utc::now(), self.refresh_buffer_secs) {
            debug!(user_email, "stored access token still valid");
            return Ok(credential);
        }

        self.refresh(user_email, credential).await
    }

    /// Unconditionally refresh the stored credential. Used for the single
    /// refresh-and-retry pass after an unauthorized response.
    #[instrument(skip(self))]
    pub async fn force_refresh(&self, user_email: &str) -> Result<Credential> {
        let credential =
            self.store.get(user_email, &self.provider).await?.ok_or_else(|| {
                ShotFlowError::Config(format!(
                    "no calendar credentials stored for {user_email}; reconnect the integration"
                ))
            })?;

        self.refresh(user_email, credential).await
    }

    async fn refresh(&self, user_email: &str, credential: Credential) -> Result<Credential> {
        let Some(refresh_token) = credential.refresh_token.clone() else {
            warn!(user_email, "access token expiring and no refresh token stored");
            return Err(ShotFlowError::ReconnectRequired(
                "no refresh token available; the calendar integration must be reconnected".into(),
            ));
        };

        let refreshed = match self.gateway.refresh_credential(&refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                warn!(user_email, error = %err, "credential refresh failed");
                return Err(ShotFlowError::ReconnectRequired(format!(
                    "credential refresh failed: {err}"
                )));
            }
        };

        let updated = Credential {
            access_token: refreshed.access_token,
            // Providers only reissue the refresh token sometimes; keep the
            // old one otherwise.
            refresh_token: refreshed.refresh_token.or(credential.refresh_token),
            expires_at: Utc::now() + Duration::seconds(refreshed.expires_in_secs),
        };

        self.store.upsert(user_email, &self.provider, &updated).await?;

        info!(user_email, provider = %self.provider, "refreshed calendar credential");

        Ok(updated)
    }
}
