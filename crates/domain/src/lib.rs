//! ShotFlow domain types.
//!
//! Shared types, error taxonomy and constants for the calendar-sync core.
//! This crate has no I/O; everything here is plain data used by `core` and
//! `infra`.

pub mod constants;
pub mod errors;
pub mod types;

pub use errors::{Result, ShotFlowError};
pub use types::{
    Attendee, CachedEvent, Config, ConflictInfo, Credential, DatabaseConfig, EventStatus,
    SyncConfig, SyncCursor, SyncOutcome, SyncReport, SyncStatus, WebhookChannel, WebhookConfig,
};
