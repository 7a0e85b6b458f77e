//! Per-document session persistence.
//!
//! A session is the annotation list plus view state for one document,
//! stored under `session-<document name>`. Two files that share a name share
//! a session.

use chrono::{DateTime, Utc};
use doc_model::{Annotation, EditMode, Preferences, Theme, Tool, ViewState, DEFAULT_SCALE};
use serde::{Deserialize, Serialize};

use crate::recent::{RecentDocument, RecentDocuments};
use crate::{KeyValueStore, StorageError};

const SESSION_SCHEMA_VERSION: u32 = 1;

pub fn session_key(document_name: &str) -> String {
    format!("session-{document_name}")
}

/// Name and byte size of the loaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentity {
    pub name: String,
    pub size: u64,
}

impl DocumentIdentity {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self { name: name.into(), size }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub annotations: Vec<Annotation>,
    pub view: ViewState,
    pub last_modified: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new(annotations: Vec<Annotation>, view: ViewState) -> Self {
        Self { annotations, view, last_modified: Utc::now() }
    }
}

// On-disk shape. Every field has a default so partially written sessions
// still restore whatever they do contain.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    annotations: Vec<Annotation>,
    #[serde(default = "default_scale")]
    scale: f32,
    #[serde(default = "default_page")]
    current_page: u32,
    #[serde(default)]
    active_tool: Tool,
    #[serde(default)]
    active_mode: EditMode,
    #[serde(default = "Utc::now")]
    last_modified: DateTime<Utc>,
}

fn default_version() -> u32 {
    SESSION_SCHEMA_VERSION
}

fn default_scale() -> f32 {
    DEFAULT_SCALE
}

fn default_page() -> u32 {
    1
}

impl From<&SessionSnapshot> for StoredSession {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            version: SESSION_SCHEMA_VERSION,
            annotations: snapshot.annotations.clone(),
            scale: snapshot.view.scale,
            current_page: snapshot.view.current_page,
            active_tool: snapshot.view.active_tool,
            active_mode: snapshot.view.active_mode,
            last_modified: snapshot.last_modified,
        }
    }
}

impl From<StoredSession> for SessionSnapshot {
    fn from(stored: StoredSession) -> Self {
        Self {
            annotations: stored.annotations,
            view: ViewState {
                scale: stored.scale,
                current_page: stored.current_page,
                active_tool: stored.active_tool,
                active_mode: stored.active_mode,
            },
            last_modified: stored.last_modified,
        }
    }
}

/// Session persistence over an injected key-value store.
#[derive(Debug, Clone)]
pub struct SessionStore<S> {
    store: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Write the session and move the document to the front of the recent
    /// list.
    pub fn save(
        &mut self,
        document: &DocumentIdentity,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(&StoredSession::from(snapshot))?;
        self.store.set(&session_key(&document.name), &json)?;

        let mut recent = self.recent_documents();
        recent.add(RecentDocument {
            name: document.name.clone(),
            size: document.size,
            last_opened: snapshot.last_modified,
            annotation_count: snapshot.annotations.len(),
        });
        recent.save_to(&mut self.store)
    }

    /// `None` when nothing is stored or the stored value is unreadable;
    /// the caller starts an empty session either way.
    pub fn load(&self, document_name: &str) -> Option<SessionSnapshot> {
        let raw = match self.store.get(&session_key(document_name)) {
            Ok(raw) => raw?,
            Err(err) => {
                log::warn!("Could not read session for {document_name}: {err}");
                return None;
            }
        };

        let stored: StoredSession = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(err) => {
                log::warn!("Discarding corrupt session for {document_name}: {err}");
                return None;
            }
        };

        if stored.version > SESSION_SCHEMA_VERSION {
            log::warn!(
                "Session for {document_name} has unsupported version {} (expected <= {})",
                stored.version,
                SESSION_SCHEMA_VERSION
            );
            return None;
        }

        Some(stored.into())
    }

    pub fn recent_documents(&self) -> RecentDocuments {
        RecentDocuments::load_from(&self.store)
    }

    pub fn preferences(&self) -> Preferences {
        crate::load_preferences(&self.store)
    }

    pub fn theme(&self) -> Theme {
        crate::load_theme(&self.store)
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), StorageError> {
        crate::save_theme(&mut self.store, theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileStore, MemoryStore};
    use doc_model::{AnnotationDraft, AnnotationStore, DocPoint};

    fn sample_snapshot() -> SessionSnapshot {
        let mut store = AnnotationStore::new();
        store.create(AnnotationDraft::at(1, DocPoint::new(12.5, 40.0)).with_text("Hi"));
        store.create(
            AnnotationDraft::at(2, DocPoint::new(0.1, 0.7))
                .with_text("second")
                .with_font_size(13.3)
                .with_color("notacolor"),
        );

        SessionSnapshot::new(
            store.all().to_vec(),
            ViewState {
                scale: 1.3,
                current_page: 2,
                active_tool: Tool::Text,
                active_mode: EditMode::Advanced,
            },
        )
    }

    #[test]
    fn save_then_load_round_trips_exactly() {
        let mut sessions = SessionStore::new(MemoryStore::new());
        let snapshot = sample_snapshot();

        sessions.save(&DocumentIdentity::new("report.pdf", 2048), &snapshot).expect("save");
        let loaded = sessions.load("report.pdf").expect("session should load");

        assert_eq!(loaded.annotations, snapshot.annotations);
        assert_eq!(loaded.view, snapshot.view);
        assert_eq!(loaded.view.scale.to_bits(), snapshot.view.scale.to_bits());
        assert_eq!(loaded.last_modified, snapshot.last_modified);
    }

    #[test]
    fn round_trip_through_file_store() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let snapshot = sample_snapshot();

        let mut sessions = SessionStore::new(FileStore::with_root(temp.path()));
        sessions.save(&DocumentIdentity::new("a b.pdf", 1), &snapshot).expect("save");

        let reopened = SessionStore::new(FileStore::with_root(temp.path()));
        assert_eq!(reopened.load("a b.pdf"), Some(snapshot));
    }

    #[test]
    fn stored_json_uses_session_key_and_camel_case() {
        let mut sessions = SessionStore::new(MemoryStore::new());
        sessions
            .save(&DocumentIdentity::new("doc.pdf", 10), &sample_snapshot())
            .expect("save should succeed");

        let raw = sessions.inner().get("session-doc.pdf").expect("get").expect("value");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(value["currentPage"], 2);
        assert_eq!(value["activeTool"], "text");
        assert_eq!(value["activeMode"], "advanced");
        assert!(value["lastModified"].is_string());
        assert_eq!(value["annotations"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn missing_session_loads_as_none() {
        let sessions = SessionStore::new(MemoryStore::new());
        assert_eq!(sessions.load("never-saved.pdf"), None);
    }

    #[test]
    fn corrupt_session_fails_softly() {
        let mut store = MemoryStore::new();
        store.set(&session_key("broken.pdf"), "{\"annotations\": [oops").expect("set");
        store.set(&session_key("wrong.pdf"), "{\"annotations\": 42}").expect("set");

        let sessions = SessionStore::new(store);
        assert_eq!(sessions.load("broken.pdf"), None);
        assert_eq!(sessions.load("wrong.pdf"), None);
    }

    #[test]
    fn future_versions_are_not_restored() {
        let mut store = MemoryStore::new();
        store.set(&session_key("new.pdf"), r#"{"version": 99, "annotations": []}"#).expect("set");

        assert_eq!(SessionStore::new(store).load("new.pdf"), None);
    }

    #[test]
    fn partial_session_fills_defaults() {
        let mut store = MemoryStore::new();
        store.set(&session_key("old.pdf"), r#"{"annotations": [], "scale": 0.3}"#).expect("set");

        let loaded = SessionStore::new(store).load("old.pdf").expect("session should load");
        assert_eq!(loaded.view.scale, 0.3);
        assert_eq!(loaded.view.current_page, 1);
        assert_eq!(loaded.view.active_tool, Tool::Select);
        assert_eq!(loaded.view.active_mode, EditMode::Basic);
    }

    #[test]
    fn save_updates_recent_documents() {
        let mut sessions = SessionStore::new(MemoryStore::new());
        let snapshot = sample_snapshot();

        sessions.save(&DocumentIdentity::new("one.pdf", 100), &snapshot).expect("save");
        sessions.save(&DocumentIdentity::new("two.pdf", 200), &snapshot).expect("save");
        sessions.save(&DocumentIdentity::new("one.pdf", 100), &snapshot).expect("save");

        let recent = sessions.recent_documents();
        let names: Vec<&str> = recent.entries().iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["one.pdf", "two.pdf"]);
        assert_eq!(recent.entries()[0].annotation_count, 2);
        assert_eq!(recent.entries()[0].size, 100);
    }

    #[test]
    fn theme_is_stored_alongside_sessions() {
        let mut sessions = SessionStore::new(MemoryStore::new());
        assert_eq!(sessions.theme(), Theme::System);

        sessions.set_theme(Theme::Light).expect("set theme");
        assert_eq!(sessions.theme(), Theme::Light);
        assert!(sessions.inner().get("theme").expect("get").is_some());
    }
}
