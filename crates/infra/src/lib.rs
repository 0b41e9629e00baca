//! # ShotFlow Infrastructure
//!
//! Infrastructure implementations of the core calendar-sync ports:
//! - SQLite repositories for the event cache, sync cursors, webhook
//!   channels, credentials and shoot linkage
//! - Google Calendar gateway (REST + OAuth token refresh)
//! - Cron-based sync and maintenance scheduling
//! - Configuration loading
//!
//! Implements traits defined in `shotflow-core`; contains all the impure
//! code (database, HTTP, clocks via cron).

pub mod config;
pub mod database;
pub mod errors;
pub mod google;
pub mod scheduling;

pub use database::{
    DbManager, SqliteCredentialStore, SqliteEventCacheRepository, SqliteShootStore,
    SqliteSyncCursorRepository, SqliteWebhookChannelRepository,
};
pub use errors::InfraError;
pub use google::GoogleCalendarGateway;
pub use scheduling::{SyncScheduler, SyncSchedulerConfig};
