//! Authoritative in-memory record map and its load/save protocol.
//!
//! This is the memory boundary for `rollbook-store`:
//! - validated add/update/delete/find/list against a lock-protected map
//! - `load` through the background worker with a bounded wait
//! - `save` as a synchronous full rewrite of the backing file

use crate::flatfile::{self, FlatFileError, SaveMode};
use crate::loader::{LoadHandle, Loader};
use crate::record::{Record, RecordId, ValidationError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// How long `load` blocks before handing back a [`LoadHandle`].
pub const DEFAULT_LOAD_WAIT: Duration = Duration::from_secs(5);

type RecordMap = BTreeMap<RecordId, Record>;
pub(crate) type SharedRecords = Arc<RwLock<RecordMap>>;

// Every critical section is a single map operation, so a poisoned lock
// still guards a consistent map.
pub(crate) fn read_lock(records: &SharedRecords) -> RwLockReadGuard<'_, RecordMap> {
    records.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock(records: &SharedRecords) -> RwLockWriteGuard<'_, RecordMap> {
    records.write().unwrap_or_else(PoisonError::into_inner)
}

/// Errors raised by store operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("record not found with id: {0}")]
    NotFound(RecordId),

    #[error(transparent)]
    FlatFile(#[from] FlatFileError),

    #[error("a load is already in progress")]
    LoadBusy,

    #[error("load worker has stopped")]
    LoaderStopped,

    #[error("failed to start load worker: {0}")]
    Worker(String),
}

/// Construction parameters for a [`Store`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub load_wait: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            load_wait: DEFAULT_LOAD_WAIT,
        }
    }

    pub fn with_load_wait(mut self, load_wait: Duration) -> Self {
        self.load_wait = load_wait;
        self
    }
}

/// Counts from one completed load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Decoded lines inserted (a repeated id counts once per line).
    pub loaded: usize,
    /// Non-blank lines dropped because they did not decode.
    pub skipped: usize,
    /// The backing file was missing and has been created empty.
    pub created: bool,
    /// The worker was told to stop before reaching the end of the file.
    pub cancelled: bool,
}

/// Result of [`Store::load`].
#[derive(Debug)]
pub enum LoadOutcome {
    /// Loading finished within the bounded wait.
    Completed(LoadReport),
    /// The wait elapsed; the worker is still inserting records.
    Pending(LoadHandle),
}

/// Result of [`Store::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub path: PathBuf,
    pub records: usize,
    pub mode: SaveMode,
}

/// Keyed record collection backed by a flat file.
///
/// All operations take `&self`; the map is shared with the load worker
/// behind an `RwLock`. Callers always receive copies of records.
#[derive(Debug)]
pub struct Store {
    records: SharedRecords,
    config: StoreConfig,
    loader: Loader,
}

impl Store {
    /// Create an empty store bound to `path` with the default load wait.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open(StoreConfig::new(path))
    }

    /// Create an empty store and start its load worker.
    ///
    /// Nothing is read until [`Store::load`] is called.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let records = SharedRecords::default();
        let loader = Loader::spawn(Arc::clone(&records))?;
        Ok(Self {
            records,
            config,
            loader,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn len(&self) -> usize {
        read_lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        read_lock(&self.records).is_empty()
    }

    /// Insert a new record.
    ///
    /// Fails with [`ValidationError::DuplicateId`] if the id is resident.
    pub fn add(&self, record: Record) -> Result<(), StoreError> {
        let mut records = write_lock(&self.records);
        record.validate()?;
        if records.contains_key(&record.id) {
            return Err(ValidationError::DuplicateId(record.id).into());
        }
        records.insert(record.id, record);
        Ok(())
    }

    /// Replace the record with the same id wholesale.
    pub fn update(&self, record: Record) -> Result<(), StoreError> {
        let mut records = write_lock(&self.records);
        let Some(slot) = records.get_mut(&record.id) else {
            return Err(StoreError::NotFound(record.id));
        };
        record.validate()?;
        *slot = record;
        Ok(())
    }

    pub fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        write_lock(&self.records)
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    pub fn find_by_id(&self, id: RecordId) -> Result<Record, StoreError> {
        read_lock(&self.records)
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Snapshot of every resident record.
    ///
    /// Happens to be in ascending id order; callers that need another order
    /// sort the snapshot themselves (see [`crate::sort_by_score_desc`]).
    pub fn list_all(&self) -> Vec<Record> {
        read_lock(&self.records).values().cloned().collect()
    }

    /// Replace the store's contents from the backing file.
    ///
    /// A missing file is created empty and leaves the store empty. Otherwise
    /// the store is cleared, the file is read on the load worker, and this call
    /// blocks until the worker finishes or `load_wait` elapses. Malformed lines
    /// are skipped; for repeated ids the last line wins.
    ///
    /// On [`LoadOutcome::Pending`] the worker keeps inserting in the
    /// background and the record set is incomplete until the handle reports
    /// completion. A file that exists but cannot be opened leaves the store
    /// empty and returns the I/O error.
    pub fn load(&self) -> Result<LoadOutcome, StoreError> {
        let path = self.config.path.as_path();
        self.loader.check_ready()?;

        if !path.exists() {
            let created = flatfile::create_empty(path)?;
            write_lock(&self.records).clear();
            log::info!("created empty backing file {}", path.display());
            return Ok(LoadOutcome::Completed(LoadReport {
                created,
                ..LoadReport::default()
            }));
        }

        let handle = self.loader.start(path)?;
        match handle.wait_timeout(self.config.load_wait) {
            Some(outcome) => outcome.map(LoadOutcome::Completed),
            None => {
                log::warn!(
                    "loading {} is taking longer than {:?}; continuing in background",
                    path.display(),
                    self.config.load_wait
                );
                Ok(LoadOutcome::Pending(handle))
            }
        }
    }

    /// Write every resident record to the backing file.
    ///
    /// Records go to a temporary sibling that is renamed over the target.
    /// When the rename is refused, the bytes are copied into the target
    /// instead; that fallback is not crash-atomic and a crash mid-copy can
    /// leave the target truncated. [`SaveReport::mode`] says which path ran.
    pub fn save(&self) -> Result<SaveReport, StoreError> {
        let snapshot = self.list_all();
        let mode = flatfile::write_records_to_path(&self.config.path, &snapshot)?;
        log::info!(
            "saved {} records to {}{}",
            snapshot.len(),
            self.config.path.display(),
            if mode == SaveMode::Copied {
                " (copy fallback)"
            } else {
                ""
            }
        );
        Ok(SaveReport {
            path: self.config.path.clone(),
            records: snapshot.len(),
            mode,
        })
    }

    /// Stop the load worker. An in-flight load is cancelled between lines.
    ///
    /// Called on drop; calling it earlier lets the owner control when the
    /// worker thread is joined.
    pub fn shutdown(&mut self) {
        self.loader.shutdown();
    }
}
