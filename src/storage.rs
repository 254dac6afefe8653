//! Durable key/value storage for the cashier session

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{CashierError, Result};

/// Storage keys
pub mod keys {
    pub const TOKEN: &str = "cashier:token";
    pub const ROLE: &str = "cashier:role";
}

/// Where the session token and role live between runs.
///
/// Only [`crate::session::SessionContext`] should read or write through it.
/// Writes are fire-and-forget: an implementation logs its own I/O failures.
pub trait StorageAdapter: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);

    /// Missing keys are not an error.
    fn remove(&self, key: &str);
}

/// In-memory storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageAdapter for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.data.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut data) = self.data.write() {
            data.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut data) = self.data.write() {
            data.remove(key);
        }
    }
}

/// Session values kept as a JSON object in `<dir>/session.json`.
///
/// Every change rewrites the whole file through a temporary sibling and a
/// rename, so a crash mid-write leaves the previous session intact.
#[cfg(feature = "native-storage")]
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<Entries>,
}

/// Stored values; `Debug` lists the keys only so tokens stay out of logs.
#[cfg(feature = "native-storage")]
struct Entries(HashMap<String, String>);

#[cfg(feature = "native-storage")]
impl std::fmt::Debug for Entries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

#[cfg(feature = "native-storage")]
impl FileStorage {
    /// Open (or create) the storage directory and load `session.json` if present.
    ///
    /// A corrupt file is treated as empty, which reads as "logged out".
    pub fn open(storage_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(storage_dir).map_err(|e| {
            CashierError::config(format!(
                "cannot create state directory {}: {}",
                storage_dir.display(),
                e
            ))
        })?;

        let path = storage_dir.join("session.json");
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(CashierError::config(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Ok(Self {
            path,
            entries: RwLock::new(Entries(entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `edit` and persist the result while still holding the lock, so
    /// concurrent writers cannot reorder what reaches the disk.
    fn update(&self, edit: impl FnOnce(&mut HashMap<String, String>)) {
        let Ok(mut entries) = self.entries.write() else {
            tracing::error!("Session storage lock poisoned; change not saved");
            return;
        };
        edit(&mut entries.0);
        if let Err(e) = self.persist(&entries.0) {
            tracing::error!("Failed to write session file {}: {}", self.path.display(), e);
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) -> std::io::Result<()> {
        let contents = serde_json::to_vec_pretty(entries)?;
        let staged = self.path.with_extension("json.tmp");
        std::fs::write(&staged, contents)?;
        std::fs::rename(&staged, &self.path)
    }
}

#[cfg(feature = "native-storage")]
impl StorageAdapter for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.0.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&self, key: &str) {
        self.update(|entries| {
            entries.remove(key);
        });
    }
}
