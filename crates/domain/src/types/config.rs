//! Application configuration types.

use serde::{Deserialize, Serialize};

/// Top-level ShotFlow sync service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub webhook: WebhookConfig,
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: String,
    /// Connection pool size.
    pub pool_size: u32,
}

/// Periodic sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Cron expression for the periodic sync job.
    pub cron_expression: String,
    /// Users whose calendars the periodic job syncs.
    pub user_emails: Vec<String>,
    /// Calendar synced for each user.
    pub calendar_id: String,
    /// Whether periodic sync is enabled.
    pub enabled: bool,
}

/// Webhook channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Public callback URL registered with the provider.
    pub callback_url: String,
    /// Cron expression for the expired-channel sweep.
    pub sweep_cron_expression: String,
}
