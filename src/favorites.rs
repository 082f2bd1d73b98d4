use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tracing::{error, warn};

use crate::models::{Movie, SavedMovie};

const SAVED_KEY: &str = "saved_movies";
const COLOR_OUTPUT_KEY: &str = "color_output";

/// Minimal string key-value persistence boundary. The adapter above it
/// serializes whole collections, so one value per key is all it needs.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One file per key under the user config directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("no config directory on this platform"))?
            .join("cinescout");
        Self::at(dir)
    }

    pub fn at(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating store directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path(key);
        fs::write(&path, value).with_context(|| format!("writing {}", path.display()))
    }
}

/// Bookmark collection over a [`KeyValueStore`]. The whole list is written
/// on every mutation and re-read back, so the in-memory snapshot always
/// reflects what actually persisted. Mutations report success as `bool`;
/// storage failures are logged and come back `false`, never panicked on.
pub struct Favorites<S: KeyValueStore> {
    store: S,
    saved: Vec<SavedMovie>,
}

impl<S: KeyValueStore> Favorites<S> {
    /// Loads the saved collection. A missing key means an empty collection;
    /// an unreadable one is logged and treated the same rather than
    /// blocking startup.
    pub fn load(store: S) -> Self {
        let saved = match store.get(SAVED_KEY) {
            Ok(Some(text)) => match serde_json::from_str(&text) {
                Ok(list) => list,
                Err(e) => {
                    error!(error = %e, "saved movies unreadable, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(error = %e, "loading saved movies failed, starting empty");
                Vec::new()
            }
        };
        Self { store, saved }
    }

    pub fn all(&self) -> &[SavedMovie] {
        &self.saved
    }

    /// Re-reads the collection from storage, replacing the snapshot.
    pub fn reload(&mut self) -> bool {
        match self.store.get(SAVED_KEY) {
            Ok(Some(text)) => match serde_json::from_str(&text) {
                Ok(list) => {
                    self.saved = list;
                    true
                }
                Err(e) => {
                    error!(error = %e, "saved movies unreadable on reload");
                    false
                }
            },
            Ok(None) => {
                self.saved.clear();
                true
            }
            Err(e) => {
                error!(error = %e, "reloading saved movies failed");
                false
            }
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.saved.iter().any(|s| s.movie.id == id)
    }

    /// Saves a movie, newest first. Returns `false` without touching
    /// storage when the movie is already saved, and `false` when the write
    /// fails; `true` only for a persisted new entry.
    pub fn save(&mut self, movie: Movie) -> bool {
        if self.contains(movie.id) {
            return false;
        }
        let mut next = self.saved.clone();
        next.insert(
            0,
            SavedMovie {
                movie,
                saved_at: Utc::now().to_rfc3339(),
            },
        );
        self.persist(next)
    }

    /// Removes a movie if present. Returns `true` when the rewrite
    /// persisted, whether or not the id was in the collection.
    pub fn remove(&mut self, id: u64) -> bool {
        let next: Vec<SavedMovie> = self
            .saved
            .iter()
            .filter(|s| s.movie.id != id)
            .cloned()
            .collect();
        self.persist(next)
    }

    /// Whether result listings should use colored output. Stored as the
    /// strings "true"/"false"; absent or unreadable means on.
    pub fn color_output(&self) -> bool {
        match self.store.get(COLOR_OUTPUT_KEY) {
            Ok(Some(v)) => v != "false",
            Ok(None) => true,
            Err(e) => {
                warn!(error = %e, "reading color preference failed");
                true
            }
        }
    }

    pub fn set_color_output(&mut self, enabled: bool) -> bool {
        match self.store.set(COLOR_OUTPUT_KEY, if enabled { "true" } else { "false" }) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "persisting color preference failed");
                false
            }
        }
    }

    /// Writes the candidate list, then re-reads it so the snapshot is what
    /// the store holds rather than what we hoped it would.
    fn persist(&mut self, next: Vec<SavedMovie>) -> bool {
        let text = match serde_json::to_string(&next) {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "serializing saved movies failed");
                return false;
            }
        };
        if let Err(e) = self.store.set(SAVED_KEY, &text) {
            error!(error = %e, "persisting saved movies failed");
            return false;
        }
        self.reload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        map: HashMap<String, String>,
        fail_writes: bool,
    }

    impl KeyValueStore for MemoryStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.map.get(key).cloned())
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes {
                return Err(anyhow!("disk full"));
            }
            self.map.insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn movie(id: u64, title: &str) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            overview: String::new(),
            poster_path: None,
            backdrop_path: None,
            release_date: "2021-10-22".to_string(),
            vote_average: 7.8,
            genre_ids: None,
            genres: None,
            runtime: None,
            status: None,
            tagline: None,
        }
    }

    #[test]
    fn save_is_idempotent_per_id() {
        let mut favs = Favorites::load(MemoryStore::default());
        assert!(favs.save(movie(438631, "Dune")));
        assert!(!favs.save(movie(438631, "Dune")));
        assert_eq!(favs.all().len(), 1);
    }

    #[test]
    fn newest_save_comes_first() {
        let mut favs = Favorites::load(MemoryStore::default());
        favs.save(movie(1, "First"));
        favs.save(movie(2, "Second"));
        let ids: Vec<u64> = favs.all().iter().map(|s| s.movie.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn remove_succeeds_even_when_absent() {
        let mut favs = Favorites::load(MemoryStore::default());
        favs.save(movie(1, "Only"));
        assert!(favs.remove(999));
        assert!(favs.remove(1));
        assert!(favs.all().is_empty());
    }

    #[test]
    fn write_failure_reports_false_and_keeps_snapshot() {
        let mut favs = Favorites::load(MemoryStore::default());
        favs.save(movie(1, "Kept"));
        favs.store.fail_writes = true;
        assert!(!favs.save(movie(2, "Lost")));
        assert!(!favs.remove(1));
        assert_eq!(favs.all().len(), 1);
        assert!(favs.contains(1));
    }

    #[test]
    fn corrupt_payload_loads_as_empty() {
        let mut store = MemoryStore::default();
        store.set(SAVED_KEY, "not json").unwrap();
        let favs = Favorites::load(store);
        assert!(favs.all().is_empty());
    }

    #[test]
    fn saved_list_survives_a_reload() {
        let mut favs = Favorites::load(MemoryStore::default());
        favs.save(movie(1, "A"));
        favs.save(movie(2, "B"));
        let store = favs.store;
        let reloaded = Favorites::load(store);
        assert_eq!(reloaded.all().len(), 2);
        assert!(reloaded.all().iter().all(|s| !s.saved_at.is_empty()));
    }

    #[test]
    fn color_preference_defaults_on_and_round_trips() {
        let mut favs = Favorites::load(MemoryStore::default());
        assert!(favs.color_output());
        assert!(favs.set_color_output(false));
        assert!(!favs.color_output());
        assert!(favs.set_color_output(true));
        assert!(favs.color_output());
    }

    #[test]
    fn file_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::at(dir.path().join("cinescout")).unwrap();
        assert_eq!(store.get("missing").unwrap(), None);
        store.set(SAVED_KEY, "[]").unwrap();
        assert_eq!(store.get(SAVED_KEY).unwrap().as_deref(), Some("[]"));
    }
}
