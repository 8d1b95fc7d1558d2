//! JSON-backed deduplicating record store

use super::error::{StorageError, StorageResult};
use super::record::{Fields, PersistedStore, Record, StoreMetadata};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Store shared between concurrent item tasks
///
/// The lock is only ever held for a single `contains` or `append`, never
/// across an await point.
pub type SharedStore = Arc<Mutex<DedupStore>>;

/// Summary of the store contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub total_records: u64,
    pub last_update: DateTime<Utc>,
}

/// Append-only record set keyed by identifier
///
/// Every successful append rewrites the whole document to a sibling temp
/// file and renames it over the store, so the file on disk is always a
/// complete, parseable document.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    data: PersistedStore,
    index: HashSet<String>,
}

impl DedupStore {
    /// Opens the store at `path`
    ///
    /// A missing file yields an empty store; nothing is written until the
    /// first append. An unreadable or malformed file is moved aside to a
    /// free `<path>.corrupt[.N]` name and the store starts empty.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let data = match read_persisted(&path) {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(path = %path.display(), "No record store yet, starting empty");
                PersistedStore::empty()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Record store is unusable, starting empty"
                );
                set_aside(&path);
                PersistedStore::empty()
            }
        };

        Self::from_persisted(path, data)
    }

    /// Opens the store for inspection without touching the filesystem
    ///
    /// # Returns
    ///
    /// * `Ok(DedupStore)` - The parsed store, or an empty one if the file is missing
    /// * `Err(StorageError)` - The file could not be read or parsed; it is left in place
    pub fn open_read_only(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = read_persisted(&path)?.unwrap_or_else(PersistedStore::empty);
        Ok(Self::from_persisted(path, data))
    }

    fn from_persisted(path: PathBuf, mut data: PersistedStore) -> Self {
        let mut index = HashSet::with_capacity(data.records.len());
        data.records.retain(|record| {
            let first = index.insert(record.identifier.clone());
            if !first {
                tracing::warn!(
                    identifier = %record.identifier,
                    "Duplicate identifier in record store, keeping the first"
                );
            }
            first
        });

        let actual = data.records.len() as u64;
        if data.metadata.total_records != actual {
            tracing::warn!(
                recorded = data.metadata.total_records,
                actual,
                "Record count in store metadata is stale, correcting"
            );
            data.metadata.total_records = actual;
        }

        tracing::info!(
            path = %path.display(),
            records = actual,
            "Opened record store"
        );

        Self { path, data, index }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains(identifier)
    }

    /// Appends a record and persists the store
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The record was new and is now on disk
    /// * `Ok(false)` - The identifier was already present; nothing changed
    /// * `Err(StorageError)` - The write failed; in-memory state is unchanged
    pub fn append(
        &mut self,
        source_collection: &str,
        identifier: &str,
        fields: Fields,
    ) -> StorageResult<bool> {
        if self.contains(identifier) {
            return Ok(false);
        }

        let now = Utc::now();
        let previous_update = self.data.metadata.updated_at;

        self.data
            .records
            .push(Record::new(identifier, source_collection, now, fields));
        self.data.metadata.updated_at = now;
        self.data.metadata.total_records = self.data.records.len() as u64;

        if let Err(e) = self.persist() {
            self.data.records.pop();
            self.data.metadata.updated_at = previous_update;
            self.data.metadata.total_records = self.data.records.len() as u64;
            return Err(e);
        }

        self.index.insert(identifier.to_string());
        Ok(true)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_records: self.data.metadata.total_records,
            last_update: self.data.metadata.updated_at,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.data.records
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.data.metadata
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.records.is_empty()
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Writes the full document via temp file, fsync and rename
    fn persist(&self) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(&self.data)?;
        let tmp_path = sibling(&self.path, ".tmp");

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
        }

        let written = write_synced(&tmp_path, json.as_bytes())
            .and_then(|_| fs::rename(&tmp_path, &self.path).map_err(|e| io_error(&self.path, e)));

        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }

        written
    }
}

/// Reads and parses the store document; `None` if the file does not exist
fn read_persisted(path: &Path) -> StorageResult<Option<PersistedStore>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

fn write_synced(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let mut file = File::create(path).map_err(|e| io_error(path, e))?;
    file.write_all(bytes).map_err(|e| io_error(path, e))?;
    file.sync_all().map_err(|e| io_error(path, e))?;
    Ok(())
}

/// Moves an unusable store file out of the way
///
/// Earlier backups are kept: the first free name of `<path>.corrupt`,
/// `<path>.corrupt.1`, `<path>.corrupt.2`, ... is used.
fn set_aside(path: &Path) {
    let target = free_corrupt_name(path);
    match fs::rename(path, &target) {
        Ok(()) => tracing::warn!(
            from = %path.display(),
            to = %target.display(),
            "Moved unusable record store aside"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Could not move unusable record store aside"
        ),
    }
}

fn free_corrupt_name(path: &Path) -> PathBuf {
    let first = sibling(path, ".corrupt");
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| sibling(path, &format!(".corrupt.{}", n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// `path` with `suffix` appended to its file name
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}
