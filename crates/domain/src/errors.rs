//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for ShotFlow's calendar sync core.
///
/// Variants follow how the caller must react: some abort immediately, some
/// trigger a credential refresh, some are retried with backoff and some are
/// handled transparently inside the engine (`CursorExpired`).
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ShotFlowError {
    /// Missing provider setup or credentials entirely. Fatal; the user must
    /// reconnect the integration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Expired or invalid access token. Triggers exactly one credential
    /// refresh followed by a retry of the whole operation.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Refresh itself failed (revoked/expired refresh token). Must be
    /// surfaced to the end user, never silently retried.
    #[error("Reconnection required: {0}")]
    ReconnectRequired(String),

    /// Explicit rate-limit signal from the remote provider.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// 5xx-class remote failure.
    #[error("Transient server error: {0}")]
    TransientServer(String),

    /// The stored sync cursor was rejected by the provider. Not a terminal
    /// failure; the engine falls back to a full resync in the same call.
    #[error("Sync cursor expired: {0}")]
    CursorExpired(String),

    /// Event or channel no longer exists remotely.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency precondition failure; the caller's copy of the
    /// event is stale and must be refreshed before retrying the write.
    #[error("Concurrency conflict: {0}")]
    Conflict(String),

    /// Malformed local input, rejected before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShotFlowError {
    /// Whether the error should be retried under the backoff policy.
    ///
    /// Auth errors are handled separately (single refresh-and-retry) and
    /// cursor expiry is handled transparently, so neither is retryable here.
    pub fn should_retry(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::TransientServer(_) | Self::Network(_)
        )
    }

    /// Whether the error calls for a one-shot credential refresh before
    /// retrying the whole operation.
    pub fn needs_token_refresh(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Whether the error signals an invalidated sync cursor.
    pub fn is_cursor_expired(&self) -> bool {
        matches!(self, Self::CursorExpired(_))
    }

    /// Stable label suitable for metrics and structured logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Auth(_) => "auth",
            Self::ReconnectRequired(_) => "reconnect_required",
            Self::RateLimited(_) => "rate_limited",
            Self::TransientServer(_) => "transient_server",
            Self::CursorExpired(_) => "cursor_expired",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::Database(_) => "database",
            Self::Network(_) => "network",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for ShotFlow operations
pub type Result<T> = std::result::Result<T, ShotFlowError>;
