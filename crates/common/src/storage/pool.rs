//! SQLite connection pool
//!
//! Provides r2d2-based connection pooling for the sync cache database, with
//! per-connection pragmas applied on checkout: WAL mode for concurrency,
//! NORMAL synchronous mode, foreign keys on, and a busy timeout for lock
//! contention.

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{info, instrument, warn};

use super::error::{StorageError, StorageResult};

/// Pooled SQLite connection handle.
pub type SqliteConnection = PooledConnection<SqliteConnectionManager>;

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct SqlitePoolConfig {
    pub max_size: u32,
    pub connection_timeout: Duration,
    pub busy_timeout: Duration,
    pub enable_wal: bool,
    pub enable_foreign_keys: bool,
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

/// r2d2-backed SQLite connection pool.
#[derive(Debug)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    config: SqlitePoolConfig,
}

impl SqlitePool {
    /// Create a new pool for the database at `path`.
    #[instrument(fields(db_path = ?path, pool_size = config.max_size))]
    pub fn new(path: &Path, config: SqlitePoolConfig) -> StorageResult<Self> {
        let pool_config = config.clone();

        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            apply_connection_pragmas(conn, &pool_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!("failed to create connection pool: {}", e);
                StorageError::Connection(format!("failed to create pool: {e}"))
            })?;

        // Checking out one connection verifies the file is usable.
        pool.get()
            .map_err(|e| StorageError::Connection(format!("failed to get test connection: {e}")))?;

        info!(max_connections = config.max_size, "sqlite pool initialised");

        Ok(Self { pool, config })
    }

    /// Acquire a connection from the pool.
    pub fn get(&self) -> StorageResult<SqliteConnection> {
        self.pool.get().map_err(StorageError::from)
    }

    /// Maximum pool size as configured.
    pub fn max_size(&self) -> u32 {
        self.config.max_size
    }
}

fn apply_connection_pragmas(conn: &Connection, config: &SqlitePoolConfig) -> StorageResult<()> {
    let mut pragma_sql = String::new();

    if config.enable_wal {
        pragma_sql.push_str("PRAGMA journal_mode=WAL;\n");
        pragma_sql.push_str("PRAGMA wal_autocheckpoint=1000;\n");
    }

    pragma_sql.push_str("PRAGMA synchronous=NORMAL;\n");

    if config.enable_foreign_keys {
        pragma_sql.push_str("PRAGMA foreign_keys=ON;\n");
    }

    conn.execute_batch(&pragma_sql)
        .map_err(|e| StorageError::Query(format!("failed to apply pragmas: {e}")))?;

    conn.busy_timeout(config.busy_timeout)
        .map_err(|e| StorageError::Query(format!("failed to set busy timeout: {e}")))?;

    Ok(())
}
