//! SQLite database for settings and the shared activity key.
//!
//! Every process that opens the same database file sees the same
//! `shared_state` rows, which is what makes the file usable as a
//! cross-context broadcast medium. Writes are plain upserts: last writer wins.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default settings seeded into the `config` table on first open.
///
/// `(key, value, description)`
pub const DEFAULT_CONFIG: [(&str, &str, &str); 5] = [
    (
        "session_timeout_minutes",
        "30",
        "Idle minutes before the session is logged out",
    ),
    (
        "session_warning_minutes",
        "5",
        "Minutes before expiry at which the warning is shown",
    ),
    (
        "session_monitor_enabled",
        "true",
        "Whether inactivity monitoring is enabled",
    ),
    (
        "drift_poll_interval_secs",
        "10",
        "How often the shared activity timestamp is re-read (seconds)",
    ),
    (
        "activity_throttle_ms",
        "1000",
        "Minimum spacing between activity signals (milliseconds)",
    ),
];

/// A value stored under a shared key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedValue {
    pub value: i64,
    /// Context that performed the last write.
    pub origin: String,
    pub updated_at: String,
}

/// Database wrapper with thread-safe connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens or creates the database at the default location.
    ///
    /// Creates `<data dir>/sessionguard/sessionguard.db` if it doesn't exist.
    pub fn open_default() -> SqlResult<Self> {
        Self::open(&Self::default_path())
    }

    /// Opens or creates the database at `path`.
    pub fn open(path: &Path) -> SqlResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        tracing::info!(path = ?path, "Opening database");

        let conn = Connection::open(path)?;

        // WAL lets several processes share the file without blocking readers
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_secs(1))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Returns the default database path.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sessionguard")
            .join("sessionguard.db")
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initializes the database schema.
    fn init_schema(&self) -> SqlResult<()> {
        let conn = self.conn();

        conn.execute_batch(
            r#"
            -- Configuration settings
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT,
                updated_at TEXT NOT NULL
            );

            -- Keys shared by every context using this file
            CREATE TABLE IF NOT EXISTS shared_state (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL,
                origin TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;

        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;
        for (key, value, description) in DEFAULT_CONFIG {
            inserted += conn.execute(
                "INSERT OR IGNORE INTO config (key, value, description, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![key, value, description, &now],
            )?;
        }
        if inserted > 0 {
            tracing::info!("Added {} default config settings", inserted);
        }

        tracing::debug!("Database schema initialized");
        Ok(())
    }

    // === Config Methods ===

    /// Gets a configuration value by key.
    pub fn get_config(&self, key: &str) -> SqlResult<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    /// Sets a configuration value.
    ///
    /// Returns `false` if `key` is not a known setting.
    pub fn set_config(&self, key: &str, value: &str) -> SqlResult<bool> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn().execute(
            "UPDATE config SET value = ?1, updated_at = ?2 WHERE key = ?3",
            params![value, &now, key],
        )?;
        Ok(updated > 0)
    }

    /// Gets all config settings.
    pub fn get_all_config(&self) -> SqlResult<Vec<(String, String, Option<String>)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key, value, description FROM config ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        rows.collect()
    }

    // === Shared State ===

    /// Writes `value` under `key`, replacing whatever was there.
    pub fn write_shared(&self, key: &str, value: i64, origin: &str) -> SqlResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO shared_state (key, value, origin, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, origin = excluded.origin, updated_at = excluded.updated_at",
            params![key, value, origin, &now],
        )?;
        Ok(())
    }

    /// Reads the value stored under `key`, if any.
    pub fn read_shared(&self, key: &str) -> SqlResult<Option<SharedValue>> {
        self.conn()
            .query_row(
                "SELECT value, origin, updated_at FROM shared_state WHERE key = ?1",
                params![key],
                |row| {
                    Ok(SharedValue {
                        value: row.get(0)?,
                        origin: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()
    }
}
