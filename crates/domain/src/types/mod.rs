//! Domain type definitions.

pub mod calendar;
pub mod config;

pub use calendar::{
    Attendee, CachedEvent, ConflictInfo, Credential, EventStatus, SyncCursor, SyncOutcome,
    SyncReport, SyncStatus, WebhookChannel,
};
pub use config::{Config, DatabaseConfig, SyncConfig, WebhookConfig};
