//! Storage primitives shared across the workspace.

pub mod error;
pub mod pool;

pub use error::{StorageError, StorageResult};
pub use pool::{SqliteConnection, SqlitePool, SqlitePoolConfig};
