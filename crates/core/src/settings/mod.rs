//! Persisted operator settings.
//!
//! Holds process-wide values that must survive a restart. Today that is the
//! timestamp of the last successful one-time-code issuance, shared by the
//! issuance rate limiter and anything displaying the remaining cooldown.

mod memory;
mod sqlite;

pub use memory::MemorySettingsStore;
pub use sqlite::SqliteSettingsStore;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Underlying database failure.
    #[error("settings database error: {0}")]
    Database(String),

    /// A stored value could not be parsed.
    #[error("invalid stored value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Storage for persisted settings.
pub trait SettingsStore: Send + Sync {
    /// When a one-time code was last issued successfully, if ever.
    fn last_code_issuance(&self) -> Result<Option<DateTime<Utc>>, SettingsError>;

    /// Record a successful one-time-code issuance.
    fn record_code_issuance(&self, at: DateTime<Utc>) -> Result<(), SettingsError>;
}

/// Which settings backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Settings store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default)]
    pub backend: SettingsBackend,

    /// Database file for the sqlite backend.
    #[serde(default = "default_path")]
    pub path: PathBuf,
}

fn default_path() -> PathBuf {
    PathBuf::from("dropwatch.db")
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            backend: SettingsBackend::default(),
            path: default_path(),
        }
    }
}

/// Open the store described by `config`.
pub fn open_settings_store(config: &SettingsConfig) -> Result<Arc<dyn SettingsStore>, SettingsError> {
    match config.backend {
        SettingsBackend::Sqlite => Ok(Arc::new(SqliteSettingsStore::new(&config.path)?)),
        SettingsBackend::Memory => Ok(Arc::new(MemorySettingsStore::new())),
    }
}
