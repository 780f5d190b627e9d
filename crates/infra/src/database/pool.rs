//! SQLite connection pool
//!
//! Every pooled connection gets the same pragmas on checkout so that WAL,
//! foreign keys and the busy timeout hold no matter which connection a
//! repository receives.

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use servicedesk_domain::{Result, ServiceDeskError};
use tracing::{info, warn};

pub type SqlitePool = Pool<SqliteConnectionManager>;
pub type SqliteConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool sizing and per-connection pragmas.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_size: u32,
    pub connection_timeout: Duration,
    pub busy_timeout: Duration,
    pub enable_wal: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            enable_wal: true,
        }
    }
}

/// Apply connection-level pragmas
///
/// - WAL journal with autocheckpoint after 1000 pages
/// - NORMAL synchronous mode
/// - Foreign key constraints (history and work orders cascade with their
///   request)
/// - Busy timeout for lock contention between pooled writers
pub fn apply_connection_pragmas(conn: &Connection, config: &PoolConfig) -> rusqlite::Result<()> {
    let mut pragma_sql = String::new();
    if config.enable_wal {
        pragma_sql.push_str("PRAGMA journal_mode=WAL;\n");
        pragma_sql.push_str("PRAGMA wal_autocheckpoint=1000;\n");
    }
    pragma_sql.push_str("PRAGMA synchronous=NORMAL;\n");
    pragma_sql.push_str("PRAGMA foreign_keys=ON;\n");
    conn.execute_batch(&pragma_sql)?;
    conn.busy_timeout(config.busy_timeout)
}

/// Build a pool for the database file at `path`, creating the file if needed.
pub fn create_pool(path: &Path, config: PoolConfig) -> Result<SqlitePool> {
    let manager = SqliteConnectionManager::file(path)
        .with_init(move |conn| apply_connection_pragmas(conn, &config));

    let pool = Pool::builder()
        .max_size(config.max_size.max(1))
        .connection_timeout(config.connection_timeout)
        .build(manager)
        .map_err(|e| {
            warn!(error = %e, "failed to create sqlite pool");
            ServiceDeskError::Persistence(format!("failed to create pool: {e}"))
        })?;

    info!(db_path = %path.display(), max_connections = config.max_size, "sqlite pool initialised");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn pooled_connections_carry_pragmas() {
        let temp_dir = TempDir::new().unwrap();
        let pool = create_pool(&temp_dir.path().join("test.db"), PoolConfig::default()).unwrap();
        let conn = pool.get().unwrap();

        let journal_mode: String =
            conn.pragma_query_value(None, "journal_mode", |row| row.get(0)).unwrap();
        let foreign_keys: i32 =
            conn.pragma_query_value(None, "foreign_keys", |row| row.get(0)).unwrap();
        let synchronous: i32 =
            conn.pragma_query_value(None, "synchronous", |row| row.get(0)).unwrap();

        assert_eq!(journal_mode.to_lowercase(), "wal");
        assert_eq!(foreign_keys, 1);
        assert_eq!(synchronous, 1);
    }
}
