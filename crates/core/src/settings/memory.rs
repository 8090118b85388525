//! In-memory settings store.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{SettingsError, SettingsStore};

/// Settings kept only for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    last_code_issuance: RwLock<Option<DateTime<Utc>>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with an issuance timestamp.
    pub fn with_last_issuance(at: DateTime<Utc>) -> Self {
        Self {
            last_code_issuance: RwLock::new(Some(at)),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn last_code_issuance(&self) -> Result<Option<DateTime<Utc>>, SettingsError> {
        self.last_code_issuance
            .read()
            .map(|v| *v)
            .map_err(|e| SettingsError::Database(e.to_string()))
    }

    fn record_code_issuance(&self, at: DateTime<Utc>) -> Result<(), SettingsError> {
        let mut guard = self
            .last_code_issuance
            .write()
            .map_err(|e| SettingsError::Database(e.to_string()))?;
        *guard = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_read() {
        let store = MemorySettingsStore::new();
        assert!(store.last_code_issuance().unwrap().is_none());

        let at = Utc::now();
        store.record_code_issuance(at).unwrap();
        assert_eq!(store.last_code_issuance().unwrap(), Some(at));
    }
}
