use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable at {path}: {source}")]
    Unavailable { path: PathBuf, source: io::Error },
    #[error("Corrupt record at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to encode record for {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

// The two independent documents the service keeps on disk
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecordKey {
    Game,
    Scores,
}

pub trait PersistenceStore: Send + Sync {
    // Replaces the record at `key`. A reader never sees a half-written record.
    fn save<T: Serialize>(&self, key: RecordKey, record: &T) -> Result<(), StoreError>;

    // Returns `Ok(None)` when nothing is stored at `key`.
    fn load<T: DeserializeOwned>(&self, key: RecordKey) -> Result<Option<T>, StoreError>;

    // Removes the record at `key`. Removing a missing record succeeds.
    fn delete(&self, key: RecordKey) -> Result<(), StoreError>;

    fn exists(&self, key: RecordKey) -> bool;
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonFileStore { dir: dir.into() }
    }

    pub fn path(&self, key: RecordKey) -> PathBuf {
        match key {
            RecordKey::Game => self.dir.join("save.json"),
            RecordKey::Scores => self.dir.join("scores.json"),
        }
    }
}

fn unavailable(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Unavailable {
        path: path.to_path_buf(),
        source,
    }
}

// Write to a sibling temp file, flush it to disk, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let result = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(err) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!("could not sync directory {}: {}", dir.display(), err);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

impl PersistenceStore for JsonFileStore {
    fn save<T: Serialize>(&self, key: RecordKey, record: &T) -> Result<(), StoreError> {
        let path = self.path(key);
        let bytes = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Encode {
            path: path.clone(),
            source,
        })?;
        fs::create_dir_all(&self.dir).map_err(unavailable(&self.dir))?;
        write_atomic(&path, &bytes).map_err(unavailable(&path))?;
        sync_dir(&self.dir);
        debug!("saved {:?} record to {}", key, path.display());
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, key: RecordKey) -> Result<Option<T>, StoreError> {
        let path = self.path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(unavailable(&path)(err)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path, source })
    }

    fn delete(&self, key: RecordKey) -> Result<(), StoreError> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                sync_dir(&self.dir);
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                warn!("failed to delete {}: {}", path.display(), err);
                Err(unavailable(&path)(err))
            }
        }
    }

    fn exists(&self, key: RecordKey) -> bool {
        self.path(key).is_file()
    }
}
