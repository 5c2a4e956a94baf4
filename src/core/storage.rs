//! Persistence of the catalog and credential.
//!
//! The store state is written as one JSON blob under a single key:
//! `{"models": [...], "lastFetched": "<RFC 3339>" | null, "apiKey": "..."}`.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::api::Model;

pub const STORAGE_KEY: &str = "openrouter-data";

/// Minimal key/value blob store the catalog is persisted into.
pub trait BlobStore: Send + Sync {
    /// Returns `Ok(None)` when nothing is stored under `key`.
    fn read(&self, key: &str) -> io::Result<Option<String>>;
    /// Replaces whatever is stored under `key`.
    fn write(&self, key: &str, contents: &str) -> io::Result<()>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write(&self, key: &str, contents: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut temp_file = NamedTempFile::new_in(&self.dir)?;
        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file
            .persist(self.path_for(key))
            .map_err(|err| err.error)?;
        Ok(())
    }
}

/// In-process blob store, for embedding without a filesystem and for tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, contents: &str) -> io::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

/// The persisted triple. Missing and `null` fields both load as defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default, deserialize_with = "null_as_default")]
    pub models: Vec<Model>,
    #[serde(default)]
    pub last_fetched: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub api_key: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug)]
pub enum StorageError {
    Serialize(serde_json::Error),
    Write { key: String, source: io::Error },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Serialize(err) => write!(f, "Failed to serialize store data: {err}"),
            StorageError::Write { key, source } => {
                write!(f, "Failed to write store data '{key}': {source}")
            }
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StorageError::Serialize(err) => Some(err),
            StorageError::Write { source, .. } => Some(source),
        }
    }
}

/// Reads and writes [`PersistedState`] under a single key.
pub struct CatalogStorage {
    blobs: Box<dyn BlobStore>,
    key: String,
}

impl CatalogStorage {
    pub fn new(blobs: Box<dyn BlobStore>) -> Self {
        Self::with_key(blobs, STORAGE_KEY)
    }

    pub fn with_key(blobs: Box<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            blobs,
            key: key.into(),
        }
    }

    /// Restore the persisted state.
    ///
    /// Returns `None` when nothing is stored, the blob cannot be read, or it
    /// does not parse; the latter two are logged, never raised.
    pub fn load(&self) -> Option<PersistedState> {
        let contents = match self.blobs.read(&self.key) {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to read stored OpenRouter data");
                return None;
            }
        };

        match serde_json::from_str::<PersistedState>(&contents) {
            Ok(state) => {
                debug!(key = %self.key, models = state.models.len(), "loaded stored OpenRouter data");
                Some(state)
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "error parsing stored OpenRouter data");
                None
            }
        }
    }

    /// Overwrite the stored blob with `state`.
    pub fn save(&self, state: &PersistedState) -> Result<(), StorageError> {
        let contents = serde_json::to_string(state).map_err(StorageError::Serialize)?;
        self.blobs
            .write(&self.key, &contents)
            .map_err(|source| StorageError::Write {
                key: self.key.clone(),
                source,
            })
    }
}
