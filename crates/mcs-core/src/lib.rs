//! Core catalog record model shared by the source, store and sync crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub const CRATE_NAME: &str = "mcs-core";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Tag {
    pub name: String,
    pub slug: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Category {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RecordOwner {
    pub uid: String,
    pub username: String,
    pub display_name: String,
    pub profile_url: Option<String>,
    pub account: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct License {
    pub uid: String,
    pub label: String,
}

/// Canonical catalog record as handed over by a record source, one per fetch.
///
/// `extra` carries auxiliary source attributes verbatim. It is persisted but
/// never consulted when deciding whether a stored record changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub description: String,
    pub uri: String,
    pub owner: Option<RecordOwner>,
    pub license: Option<License>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub categories: Vec<Category>,
    pub source_created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub view_count: u64,
    pub like_count: u64,
    pub is_downloadable: bool,
    #[serde(default)]
    pub extra: Map<String, JsonValue>,
}

impl Record {
    /// Minimal record with only the identity and name populated.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            uri: String::new(),
            owner: None,
            license: None,
            tags: Vec::new(),
            categories: Vec::new(),
            source_created_at: None,
            last_modified_at: None,
            view_count: 0,
            like_count: 0,
            is_downloadable: false,
            extra: Map::new(),
        }
    }
}

/// Persisted counterpart of [`Record`].
///
/// `created_at` is written once, at first insertion. `fetched_at` moves
/// forward on every reconciliation pass that sees the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(flatten)]
    pub record: Record,
    pub created_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// Per-pass tally of how each record in a batch was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ReconciliationOutcome {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}
