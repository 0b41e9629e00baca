//! Webhook channel lifecycle.
//!
//! Registers push-notification channels with the remote provider and keeps
//! the local registry's invariant: at most one active channel per
//! (user_email, calendar_id). Superseded and expired channels are
//! deactivated, never deleted, so the registry doubles as an audit trail.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shotflow_domain::{Result, ShotFlowError, SyncReport, WebhookChannel};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::credentials::CredentialService;
use super::engine::SyncEngine;
use super::ports::{CalendarGateway, WebhookChannelRepository};

/// Webhook channel service for one provider.
pub struct ChannelService {
    gateway: Arc<dyn CalendarGateway>,
    credentials: Arc<CredentialService>,
    channels: Arc<dyn WebhookChannelRepository>,
    callback_url: String,
}

impl ChannelService {
    pub fn new(
        gateway: Arc<dyn CalendarGateway>,
        credentials: Arc<CredentialService>,
        channels: Arc<dyn WebhookChannelRepository>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self { gateway, credentials, channels, callback_url: callback_url.into() }
    }

    /// Register a new push channel for (user, calendar), deactivating any
    /// channel currently active for the pair first.
    #[instrument(skip(self))]
    pub async fn create_channel(
        &self,
        user_email: &str,
        calendar_id: &str,
    ) -> Result<WebhookChannel> {
        let credential = self.credentials.ensure_valid(user_email).await?;

        if let Some(existing) = self.channels.find_active(user_email, calendar_id).await? {
            info!(channel_id = %existing.channel_id, "superseding active webhook channel");
            self.stop_remote(&credential, &existing).await;
            self.channels.deactivate(&existing.channel_id).await?;
        }

        let channel_id = Uuid::new_v4().to_string();
        let registration = self
            .gateway
            .create_channel(&credential, calendar_id, &channel_id, &self.callback_url)
            .await?;

        let channel = WebhookChannel {
            channel_id: registration.channel_id,
            user_email: user_email.to_string(),
            calendar_id: calendar_id.to_string(),
            resource_id: registration.resource_id,
            resource_uri: registration.resource_uri,
            verification_token: None,
            expiration: registration.expiration,
            active: true,
        };
        self.channels.insert(&channel).await?;

        info!(channel_id = %channel.channel_id, expiration = %channel.expiration, "webhook channel registered");
        Ok(channel)
    }

    /// Stop a channel remotely and mark it inactive locally. Unknown channel
    /// ids are an error; a channel already gone remotely is not.
    #[instrument(skip(self))]
    pub async fn deactivate_channel(&self, channel_id: &str) -> Result<()> {
        let channel = self.channels.find_by_channel_id(channel_id).await?.ok_or_else(|| {
            ShotFlowError::NotFound(format!("webhook channel {channel_id} is not registered"))
        })?;

        let credential = self.credentials.ensure_valid(&channel.user_email).await?;
        self.stop_remote(&credential, &channel).await;
        self.channels.deactivate(channel_id).await?;

        info!(channel_id, "webhook channel deactivated");
        Ok(())
    }

    /// Deactivate channels still marked active whose expiration has passed.
    /// Maintenance operation, run on a schedule. Returns the number swept.
    #[instrument(skip(self))]
    pub async fn sweep_expired_channels(&self, now: DateTime<Utc>) -> Result<usize> {
        let expired = self.channels.list_expired(now).await?;
        let mut swept = 0;

        for channel in expired {
            if self.channels.deactivate(&channel.channel_id).await? {
                debug!(channel_id = %channel.channel_id, "deactivated expired webhook channel");
                swept += 1;
            }
        }

        if swept > 0 {
            info!(swept, "expired webhook channels deactivated");
        }
        Ok(swept)
    }

    /// Handle an inbound push notification. Resolves the channel id to its
    /// (user, calendar) and runs an incremental sync; unrecognized or
    /// inactive channel ids yield `Ok(None)` so the HTTP layer can still
    /// acknowledge them.
    #[instrument(skip(self, engine))]
    pub async fn handle_notification(
        &self,
        engine: &SyncEngine,
        channel_id: &str,
    ) -> Result<Option<SyncReport>> {
        let Some(channel) = self.channels.find_by_channel_id(channel_id).await? else {
            debug!(channel_id, "notification for unknown webhook channel, ignoring");
            return Ok(None);
        };

        if !channel.active {
            debug!(channel_id, "notification for inactive webhook channel, ignoring");
            return Ok(None);
        }

        let report =
            engine.sync_calendar(&channel.user_email, &channel.calendar_id, false).await;
        Ok(Some(report))
    }

    /// Best-effort remote stop. The provider reporting the channel gone is
    /// equivalent to a successful stop; other failures are logged and the
    /// local deactivation proceeds regardless.
    async fn stop_remote(
        &self,
        credential: &shotflow_domain::Credential,
        channel: &WebhookChannel,
    ) {
        match self.gateway.stop_channel(credential, &channel.channel_id, &channel.resource_id).await
        {
            Ok(()) => {}
            Err(ShotFlowError::NotFound(_)) => {
                debug!(channel_id = %channel.channel_id, "channel already gone remotely");
            }
            Err(err) => {
                warn!(channel_id = %channel.channel_id, error = %err, "remote channel stop failed");
            }
        }
    }
}
