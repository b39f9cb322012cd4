//! Durable client-side key/value storage.
//!
//! The portal keeps two kinds of state across restarts: the token pair and the
//! persisted session flag. Both sit behind [`Storage`], a synchronous
//! string-to-string map in the spirit of browser local storage. Write failures
//! are logged rather than returned, so callers never branch on them.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Context;
use parking_lot::Mutex;

pub const STORAGE_DIR_ENV: &str = "ANTCO_STORAGE_DIR";

pub trait Storage: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    /// Removing an absent key is a no-op.
    fn remove(&self, key: &str);
}

/// Process-local storage; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

/// Storage persisted as a single JSON object on disk.
///
/// Reads are served from memory; every mutation rewrites the file through a
/// temporary sibling and a rename.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `path`.
    ///
    /// A missing file starts empty. An unreadable or corrupt file also starts
    /// empty, with a warning: losing a session is preferable to refusing to
    /// start.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create storage directory at {:?}", parent))?;
        }

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!("ignoring corrupt storage file {:?}: {err}", path);
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read storage file {:?}", path));
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Open the storage file at its default location (see [`default_storage_path`]).
    pub fn open_default() -> anyhow::Result<Self> {
        Self::open(default_storage_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) {
        if let Err(err) = write_atomically(&self.path, entries) {
            tracing::error!("failed to persist storage to {:?}: {err:?}", self.path);
        }
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}

fn write_atomically(path: &Path, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(entries).context("failed to encode storage")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("failed to write {:?}", tmp))?;
    std::fs::rename(&tmp, path).with_context(|| format!("failed to move {:?} into place", tmp))?;
    Ok(())
}

/// Resolve the storage file: `$ANTCO_STORAGE_DIR/storage.json`, else
/// `{app_data_dir}/antco-portal/storage.json`.
pub fn default_storage_path() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var(STORAGE_DIR_ENV) {
        return Ok(PathBuf::from(dir).join("storage.json"));
    }

    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    Ok(base.join("antco-portal").join("storage.json"))
}
