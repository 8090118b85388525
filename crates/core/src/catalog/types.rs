//! Catalog data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One purchasable item as listed by the upstream catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Opaque upstream identifier, used for every later request.
    pub entry_id: String,
    /// Main display label (e.g. the sale title).
    pub primary_label: String,
    /// Secondary label (e.g. the model/trim name).
    #[serde(default)]
    pub secondary_label: String,
    /// Any other upstream attributes needed by the gateway at submission time.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub attributes: serde_json::Value,
}

impl CatalogEntry {
    /// Create an entry with no extra attributes.
    pub fn new(
        entry_id: impl Into<String>,
        primary_label: impl Into<String>,
        secondary_label: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            primary_label: primary_label.into(),
            secondary_label: secondary_label.into(),
            attributes: serde_json::Value::Null,
        }
    }

    /// Both labels joined by a single space, as used for matching.
    pub fn combined_label(&self) -> String {
        format!("{} {}", self.primary_label, self.secondary_label)
    }

    /// Label suitable for operator messages.
    pub fn display_label(&self) -> &str {
        if self.secondary_label.trim().is_empty() {
            &self.primary_label
        } else {
            &self.secondary_label
        }
    }
}

/// All entries fetched in one upstream call, in upstream order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub entries: Vec<CatalogEntry>,
    pub fetched_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Wrap entries fetched just now.
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_label() {
        let entry = CatalogEntry::new("1", "Model X", "Deluxe Trim");
        assert_eq!(entry.combined_label(), "Model X Deluxe Trim");
    }

    #[test]
    fn test_display_label_prefers_secondary() {
        let entry = CatalogEntry::new("1", "Spring sale", "Model X");
        assert_eq!(entry.display_label(), "Model X");

        let entry = CatalogEntry::new("1", "Model X", "");
        assert_eq!(entry.display_label(), "Model X");
    }

    #[test]
    fn test_entry_deserialize_minimal() {
        let json = r#"{"entry_id": "42", "primary_label": "Model X"}"#;
        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.entry_id, "42");
        assert_eq!(entry.secondary_label, "");
        assert!(entry.attributes.is_null());
    }

    #[test]
    fn test_snapshot_len() {
        let snapshot = CatalogSnapshot::new(vec![CatalogEntry::new("1", "a", "b")]);
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.is_empty());
        assert!(CatalogSnapshot::new(vec![]).is_empty());
    }
}
