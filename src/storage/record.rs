//! Persisted record and store document types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Extractor-specific fields of a record
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Keys owned by the store; extractor fields with these names are dropped
pub const RESERVED_KEYS: [&str; 3] = ["identifier", "sourceCollection", "collectedAt"];

/// One collected item
///
/// The three required keys are typed; everything the extractor produced is
/// flattened next to them in the persisted JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Canonical detail-page address, the dedup key
    pub identifier: String,

    /// Entry address of the collection the item was found in
    pub source_collection: String,

    pub collected_at: DateTime<Utc>,

    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn new(
        identifier: impl Into<String>,
        source_collection: impl Into<String>,
        collected_at: DateTime<Utc>,
        mut fields: Fields,
    ) -> Self {
        for key in RESERVED_KEYS {
            fields.remove(key);
        }

        Self {
            identifier: identifier.into(),
            source_collection: source_collection.into(),
            collected_at,
            fields,
        }
    }
}

/// Store-level bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_records: u64,
}

/// The whole persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedStore {
    pub metadata: StoreMetadata,
    pub records: Vec<Record>,
}

impl PersistedStore {
    /// Empty skeleton stamped with the current time
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            metadata: StoreMetadata {
                created_at: now,
                updated_at: now,
                total_records: 0,
            },
            records: Vec::new(),
        }
    }
}
