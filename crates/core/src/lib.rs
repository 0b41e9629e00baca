//! ShotFlow core: calendar sync engine, conflict detection, credential
//! lifecycle and webhook channel management, behind port traits implemented
//! by the infra crate.

pub mod calendar;

pub use calendar::{
    ChannelService, ConflictDetector, CredentialService, ReconciliationService, SyncEngine,
    SyncLockRegistry,
};
