//! Calendar synchronization core.
//!
//! The engine and its collaborating services, all speaking to the outside
//! world through the port traits in [`ports`].

pub mod channels;
pub mod conflicts;
pub mod credentials;
pub mod engine;
pub mod locks;
pub mod ports;
pub mod reconcile;

pub use channels::ChannelService;
pub use conflicts::ConflictDetector;
pub use credentials::CredentialService;
pub use engine::SyncEngine;
pub use locks::SyncLockRegistry;
pub use reconcile::ReconciliationService;
