//! Database implementations of the core persistence ports.

pub mod channel_repository;
pub mod credential_repository;
pub mod cursor_repository;
pub mod event_cache_repository;
pub mod manager;
pub mod shoot_repository;

pub use channel_repository::SqliteWebhookChannelRepository;
pub use credential_repository::SqliteCredentialStore;
pub use cursor_repository::SqliteSyncCursorRepository;
pub use event_cache_repository::SqliteEventCacheRepository;
pub use manager::DbManager;
pub use shoot_repository::SqliteShootStore;
