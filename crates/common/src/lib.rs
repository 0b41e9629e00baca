//! ShotFlow shared infrastructure building blocks.
//!
//! Resilience (retry/backoff) and storage (SQLite pooling) primitives used
//! by the core engine and the infra adapters. Nothing in this crate knows
//! about calendars.

pub mod resilience;
pub mod storage;
pub mod telemetry;
