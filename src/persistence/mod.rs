//! Progress persistence
//!
//! Tracks which level of a pack the player is on. Values live in a flat
//! key/value store so hosts can back it with whatever storage they have.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::level::LevelCatalog;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("progress file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt progress data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Integer key/value storage
pub trait ProgressStore {
    fn get(&self, key: &str) -> Option<i64>;
    fn set(&mut self, key: &str, value: i64) -> Result<(), PersistenceError>;
}

/// Volatile store, for tests and headless runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, i64>,
}

impl ProgressStore for MemoryStore {
    fn get(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: i64) -> Result<(), PersistenceError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a JSON object on disk, rewritten on every `set`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, i64>,
}

impl JsonFileStore {
    /// Open the store; a missing file starts empty
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let values = match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No progress file at {}, starting fresh", path.display());
                BTreeMap::new()
            }
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, json).map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl ProgressStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: i64) -> Result<(), PersistenceError> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }
}

/// Current level index of one pack
#[derive(Debug)]
pub struct LevelSession<S: ProgressStore> {
    store: S,
    key: String,
    current: usize,
    level_count: usize,
}

impl<S: ProgressStore> LevelSession<S> {
    /// Resume from the stored index, clamped into the pack
    pub fn load(store: S, pack_name: &str, catalog: &impl LevelCatalog) -> Self {
        let key = format!("{pack_name}_level");
        let level_count = catalog.level_count();
        let stored = store.get(&key).unwrap_or(0);
        let current = if stored < 0 || stored as usize >= level_count {
            if stored != 0 {
                log::warn!("Stored level {stored} outside pack '{pack_name}', restarting");
            }
            0
        } else {
            stored as usize
        };
        Self {
            store,
            key,
            current,
            level_count,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Move to the next level, wrapping after the last one
    pub fn advance(&mut self) -> Result<usize, PersistenceError> {
        self.current = if self.current + 1 >= self.level_count {
            0
        } else {
            self.current + 1
        };
        self.store.set(&self.key, self.current as i64)?;
        log::info!("Advanced to level {}", self.current);
        Ok(self.current)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
