//! SQLite-backed settings store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{SettingsError, SettingsStore};

const LAST_CODE_ISSUANCE: &str = "last_code_issuance";

/// Settings persisted in a key/value table.
pub struct SqliteSettingsStore {
    conn: Mutex<Connection>,
}

impl SqliteSettingsStore {
    /// Open (or create) the settings database at `path`.
    pub fn new(path: &Path) -> Result<Self, SettingsError> {
        let conn = Connection::open(path).map_err(|e| SettingsError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, SettingsError> {
        let conn =
            Connection::open_in_memory().map_err(|e| SettingsError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), SettingsError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| SettingsError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, SettingsError> {
        self.conn
            .lock()
            .map_err(|e| SettingsError::Database(e.to_string()))
    }

    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| SettingsError::Database(e.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|e| SettingsError::Database(e.to_string()))?;
        Ok(())
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn last_code_issuance(&self) -> Result<Option<DateTime<Utc>>, SettingsError> {
        let Some(raw) = self.get(LAST_CODE_ISSUANCE)? else {
            return Ok(None);
        };

        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| SettingsError::InvalidValue {
                key: LAST_CODE_ISSUANCE.to_string(),
                reason: e.to_string(),
            })
    }

    fn record_code_issuance(&self, at: DateTime<Utc>) -> Result<(), SettingsError> {
        self.set(LAST_CODE_ISSUANCE, &at.to_rfc3339())
    }
}
