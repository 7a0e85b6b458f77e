//! Recently opened documents, most recent first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{KeyValueStore, StorageError};

/// Maximum number of recent documents tracked.
pub const MAX_RECENT_DOCUMENTS: usize = 5;

pub const RECENT_DOCUMENTS_KEY: &str = "recent-documents";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDocument {
    pub name: String,
    pub size: u64,
    pub last_opened: DateTime<Utc>,
    pub annotation_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecentDocuments {
    entries: Vec<RecentDocument>,
}

impl RecentDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `document` at the front. An existing entry with the same name
    /// is replaced and the list is capped at [`MAX_RECENT_DOCUMENTS`].
    pub fn add(&mut self, document: RecentDocument) {
        self.entries.retain(|entry| entry.name != document.name);
        self.entries.insert(0, document);
        self.entries.truncate(MAX_RECENT_DOCUMENTS);
    }

    pub fn entries(&self) -> &[RecentDocument] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Missing or unreadable lists load empty.
    pub fn load_from(store: &impl KeyValueStore) -> Self {
        let raw = match store.get(RECENT_DOCUMENTS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::default(),
            Err(err) => {
                log::warn!("Could not read recent documents: {err}");
                return Self::default();
            }
        };

        match serde_json::from_str::<Vec<RecentDocument>>(&raw) {
            Ok(mut entries) => {
                entries.truncate(MAX_RECENT_DOCUMENTS);
                Self { entries }
            }
            Err(err) => {
                log::warn!("Ignoring corrupt recent documents list: {err}");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, store: &mut impl KeyValueStore) -> Result<(), StorageError> {
        store.set(RECENT_DOCUMENTS_KEY, &serde_json::to_string(&self.entries)?)
    }
}
