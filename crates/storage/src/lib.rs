use directories::ProjectDirs;
use doc_model::{Preferences, Theme};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub mod recent;
pub mod session;

pub use recent::{RecentDocument, RecentDocuments, MAX_RECENT_DOCUMENTS, RECENT_DOCUMENTS_KEY};
pub use session::{session_key, DocumentIdentity, SessionSnapshot, SessionStore};

const PREFS_SCHEMA_VERSION: u32 = 1;

pub const PREFERENCES_KEY: &str = "preferences";
pub const THEME_KEY: &str = "theme";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable string key-value store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// In-process store; nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

// Leaves room for the `.json`/`.tmp` suffix under the common 255-byte limit.
const MAX_FILE_STEM: usize = 200;
const LONG_KEY_PREFIX: usize = 120;

/// One file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PdfAnnotate", "pdf-annotate")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys are urlencoded into file names. Encoded names longer than
    /// [`MAX_FILE_STEM`] keep a prefix and append an md5 digest of the full
    /// key; `%~` never occurs in urlencoded text, so the two forms cannot
    /// collide.
    fn entry_path(&self, key: &str) -> PathBuf {
        let encoded = urlencoding::encode(key);
        let stem = if encoded.len() <= MAX_FILE_STEM {
            encoded.into_owned()
        } else {
            let digest = md5::compute(key.as_bytes());
            format!("{}%~{digest:x}", &encoded[..LONG_KEY_PREFIX])
        };
        self.root.join(format!("{stem}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let path = self.entry_path(key);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: Preferences,
}

/// Missing or unreadable preferences load as defaults.
pub fn load_preferences(store: &impl KeyValueStore) -> Preferences {
    let raw = match store.get(PREFERENCES_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Preferences::default(),
        Err(err) => {
            log::warn!("Could not read preferences: {err}");
            return Preferences::default();
        }
    };

    match serde_json::from_str::<PreferencesEnvelope>(&raw) {
        Ok(envelope) => envelope.preferences,
        Err(err) => {
            log::warn!("Ignoring corrupt preferences: {err}");
            Preferences::default()
        }
    }
}

pub fn save_preferences(
    store: &mut impl KeyValueStore,
    preferences: &Preferences,
) -> Result<(), StorageError> {
    let envelope =
        PreferencesEnvelope { version: PREFS_SCHEMA_VERSION, preferences: preferences.clone() };

    store.set(PREFERENCES_KEY, &serde_json::to_string_pretty(&envelope)?)
}

pub fn load_theme(store: &impl KeyValueStore) -> Theme {
    match store.get(THEME_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            log::warn!("Ignoring unknown theme {raw:?}: {err}");
            Theme::default()
        }),
        Ok(None) => Theme::default(),
        Err(err) => {
            log::warn!("Could not read theme: {err}");
            Theme::default()
        }
    }
}

pub fn save_theme(store: &mut impl KeyValueStore, theme: Theme) -> Result<(), StorageError> {
    store.set(THEME_KEY, &serde_json::to_string(&theme)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path());

        let prefs = Preferences {
            default_font_size: 18.0,
            default_color: "#ef4444".to_owned(),
            ..Preferences::default()
        };

        save_preferences(&mut store, &prefs).expect("save should succeed");
        assert_eq!(load_preferences(&store), prefs);
    }

    #[test]
    fn load_defaults_when_preferences_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::with_root(temp.path());

        assert_eq!(load_preferences(&store), Preferences::default());
    }

    #[test]
    fn corrupt_preferences_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set(PREFERENCES_KEY, "{ not json").expect("set should succeed");

        assert_eq!(load_preferences(&store), Preferences::default());
    }

    #[test]
    fn theme_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(load_theme(&store), Theme::System);

        save_theme(&mut store, Theme::Dark).expect("save should succeed");
        assert_eq!(store.get(THEME_KEY).expect("get should succeed").as_deref(), Some("\"dark\""));
        assert_eq!(load_theme(&store), Theme::Dark);
    }

    #[test]
    fn file_store_get_set_remove() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path().join("nested"));

        assert_eq!(store.get("session-a.pdf").expect("get should succeed"), None);
        store.set("session-a.pdf", "{}").expect("set should succeed");
        assert_eq!(store.get("session-a.pdf").expect("get should succeed").as_deref(), Some("{}"));

        store.remove("session-a.pdf").expect("remove should succeed");
        assert_eq!(store.get("session-a.pdf").expect("get should succeed"), None);
        store.remove("session-a.pdf").expect("removing twice should succeed");
    }

    #[test]
    fn file_store_keeps_path_like_keys_inside_root() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path());

        store.set("session-../../escape.pdf", "x").expect("set should succeed");
        store.set("session-dir/report v2.pdf", "y").expect("set should succeed");

        let files: Vec<_> = fs::read_dir(temp.path())
            .expect("root should be readable")
            .map(|entry| entry.expect("entry should be readable").path())
            .collect();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|path| path.parent() == Some(temp.path())));
        assert_eq!(
            store.get("session-dir/report v2.pdf").expect("get should succeed").as_deref(),
            Some("y")
        );
    }

    #[test]
    fn file_store_accepts_keys_longer_than_a_file_name() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = FileStore::with_root(temp.path());
        let first = format!("session-{}.pdf", "é".repeat(50));
        let second = format!("session-{}.pdf", "é".repeat(51));

        store.set(&first, "one").expect("long key should be stored");
        store.set(&second, "two").expect("long key should be stored");

        assert_eq!(store.get(&first).expect("get should succeed").as_deref(), Some("one"));
        assert_eq!(store.get(&second).expect("get should succeed").as_deref(), Some("two"));
        for entry in fs::read_dir(temp.path()).expect("root should be readable") {
            let name = entry.expect("entry should be readable").file_name();
            assert!(name.len() <= 255, "file name too long: {}", name.len());
        }

        store.remove(&first).expect("remove should succeed");
        assert_eq!(store.get(&first).expect("get should succeed"), None);
        assert_eq!(store.get(&second).expect("get should succeed").as_deref(), Some("two"));
    }
}
