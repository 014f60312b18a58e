//! URL-keyed HTTP response cache backed by SQLite

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::version::error::CacheError;

/// A cached response body together with the status it was served with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub body: String,
    pub fetched_at: i64,
}

impl CachedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Schema migrations
/// Each version contains a list of SQL statements to execute
const MIGRATIONS: &[&[&str]] = &[
    // v1: lookups by age for pruning
    &["CREATE INDEX IF NOT EXISTS idx_fetched_at ON responses(fetched_at)"],
];

pub struct HttpCache {
    conn: Mutex<Connection>,
    ttl_ms: i64,
}

impl HttpCache {
    pub fn new(db_path: &Path, ttl_ms: i64) -> Result<Self, CacheError> {
        info!("Initializing HTTP cache database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::from_connection(conn, ttl_ms)
    }

    /// Opens a cache that lives only as long as this value
    pub fn in_memory(ttl_ms: i64) -> Result<Self, CacheError> {
        Self::from_connection(Connection::open_in_memory()?, ttl_ms)
    }

    fn from_connection(conn: Connection, ttl_ms: i64) -> Result<Self, CacheError> {
        let cache = Self {
            conn: Mutex::new(conn),
            ttl_ms,
        };
        cache.create_schema()?;
        debug!("HTTP cache ready");
        Ok(cache)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Get current timestamp in milliseconds since UNIX epoch
    fn current_timestamp_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn create_schema(&self) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS responses (
                request_key TEXT PRIMARY KEY,
                status INTEGER NOT NULL,
                body TEXT NOT NULL,
                fetched_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        Self::apply_migrations(&conn)?;
        Ok(())
    }

    /// Apply pending migrations based on user_version pragma
    fn apply_migrations(conn: &Connection) -> Result<(), CacheError> {
        let current_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        for (i, statements) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                for sql in *statements {
                    conn.execute(sql, [])?;
                }
                debug!("Applied migration v{}", version);
            }
        }

        let target_version = MIGRATIONS.len() as i32;
        if target_version > current_version {
            conn.pragma_update(None, "user_version", target_version)?;
        }

        Ok(())
    }

    /// Returns the cached response for `key` if it has not expired
    pub fn get(&self, key: &str) -> Result<Option<CachedResponse>, CacheError> {
        let conn = self.lock_conn()?;
        let oldest_valid = Self::current_timestamp_ms() - self.ttl_ms;

        let response = conn
            .query_row(
                "SELECT status, body, fetched_at FROM responses WHERE request_key = ?1 AND fetched_at >= ?2",
                (key, oldest_valid),
                |row| {
                    Ok(CachedResponse {
                        status: row.get(0)?,
                        body: row.get(1)?,
                        fetched_at: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(response)
    }

    /// Stores (or replaces) the response for `key`
    pub fn put(&self, key: &str, status: u16, body: &str) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO responses (request_key, status, body, fetched_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(request_key) DO UPDATE SET
                status = excluded.status,
                body = excluded.body,
                fetched_at = excluded.fetched_at
            "#,
            (key, status, body, Self::current_timestamp_ms()),
        )?;
        Ok(())
    }

    /// Removes every entry older than the configured TTL, returning how many were dropped
    pub fn prune_expired(&self) -> Result<usize, CacheError> {
        let conn = self.lock_conn()?;
        let oldest_valid = Self::current_timestamp_ms() - self.ttl_ms;
        let removed = conn.execute(
            "DELETE FROM responses WHERE fetched_at < ?1",
            [oldest_valid],
        )?;
        if removed > 0 {
            info!("Pruned {} expired HTTP cache entries", removed);
        }
        Ok(removed)
    }
}
