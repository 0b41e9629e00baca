//! Shared constants for the sync engine.

/// Safety buffer before access-token expiry that still triggers a refresh.
pub const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

/// Forward window synced from the remote calendar: today through this many
/// days ahead.
pub const SYNC_HORIZON_DAYS: i64 = 14;

/// Maximum attempts for retryable remote failures.
pub const MAX_SYNC_ATTEMPTS: u32 = 5;

/// Base delay for exponential backoff.
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Upper bound on a single backoff delay.
pub const RETRY_MAX_DELAY_SECS: u64 = 60;

/// Jitter applied to each computed delay, as a fraction of the delay.
pub const RETRY_JITTER_RATIO: f64 = 0.1;

/// Reason recorded on internal records whose remote event disappeared.
pub const DELETED_EXTERNALLY_REASON: &str = "deleted externally";

/// Provider key used for the credential store.
pub const PROVIDER_GOOGLE: &str = "google";
