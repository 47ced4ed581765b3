//! JSON partition store
//!
//! Each worker owns exactly one partition file and the identifier set derived
//! from it. Every accepted record triggers a full rewrite of the file, so the
//! partition on disk is never more than one record behind memory.

use crate::storage::record::{normalize_id, Record};
use crate::storage::{StorageError, StorageResult};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Process-wide lock serializing partition loads and rewrites
///
/// Workers write distinct files, but they share one filesystem; holding this
/// lock for a whole load or rewrite keeps their I/O from interleaving.
pub type PersistLock = Arc<Mutex<()>>;

/// Creates a fresh persistence lock to be cloned into every store
pub fn new_persist_lock() -> PersistLock {
    Arc::new(Mutex::new(()))
}

/// Where the last persistence attempt landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The primary partition file was rewritten
    Primary,

    /// The primary write failed; the backup file was rewritten instead
    Backup,

    /// Both writes failed; the records only live in memory until the next
    /// successful persist
    InMemoryOnly,
}

impl PersistOutcome {
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::InMemoryOnly)
    }
}

/// A worker's partition: its records, their identifiers, and the backing file
pub struct RecordStore {
    path: PathBuf,
    backup_path: PathBuf,
    id_label: String,
    records: Vec<Record>,
    ids: HashSet<String>,
    lock: PersistLock,
}

impl RecordStore {
    /// Creates an empty store bound to a partition file
    ///
    /// Nothing is read until `load` is called.
    ///
    /// # Arguments
    ///
    /// * `path` - The partition file, e.g. `output/3.json`
    /// * `id_label` - Certification label holding the certificate number
    /// * `lock` - The process-wide persistence lock
    pub fn new(path: impl Into<PathBuf>, id_label: impl Into<String>, lock: PersistLock) -> Self {
        let path = path.into();
        let backup_path = backup_path_for(&path);
        Self {
            path,
            backup_path,
            id_label: id_label.into(),
            records: Vec::new(),
            ids: HashSet::new(),
            lock,
        }
    }

    /// Loads the partition from disk, replacing the in-memory state
    ///
    /// An absent file is a fresh partition, not an error. A file that exists
    /// but does not parse is reported, so the caller never overwrites records
    /// it could not read.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of records loaded
    /// * `Err(StorageError)` - The file could not be read or parsed
    pub fn load(&mut self) -> StorageResult<usize> {
        let records = {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            read_records(&self.path)?
        };

        match records {
            Some(records) => {
                self.ids = records
                    .iter()
                    .filter_map(|record| record.certificate_number(&self.id_label))
                    .collect();
                self.records = records;
                tracing::info!(
                    "Loaded {} existing records ({} identifiers) from {}",
                    self.records.len(),
                    self.ids.len(),
                    self.path.display()
                );
            }
            None => {
                self.records.clear();
                self.ids.clear();
                tracing::info!(
                    "No partition at {}, starting a new one",
                    self.path.display()
                );
            }
        }

        Ok(self.records.len())
    }

    /// Returns true if the certificate number is already in this partition
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(&normalize_id(id))
    }

    /// Accepts a record and immediately rewrites the partition
    ///
    /// The record stays in memory whatever the outcome; a failed write is
    /// recovered by the next successful one.
    pub fn append_and_persist(&mut self, record: Record) -> PersistOutcome {
        if let Some(id) = record.certificate_number(&self.id_label) {
            self.ids.insert(id);
        }
        self.records.push(record);
        self.persist()
    }

    /// Rewrites the partition file, falling back to the backup file
    pub fn persist(&self) -> PersistOutcome {
        let body = match serialize_records(&self.records) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to serialize {} records: {}", self.records.len(), e);
                return PersistOutcome::InMemoryOnly;
            }
        };

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        match write_atomically(&self.path, &body) {
            Ok(()) => {
                tracing::info!("{} records saved to {}", self.records.len(), self.path.display());
                PersistOutcome::Primary
            }
            Err(e) => {
                tracing::error!("Failed to save {}: {}", self.path.display(), e);
                match write_atomically(&self.backup_path, &body) {
                    Ok(()) => {
                        tracing::warn!(
                            "{} records saved to backup file {}",
                            self.records.len(),
                            self.backup_path.display()
                        );
                        PersistOutcome::Backup
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to save backup {}: {}; {} records held in memory only",
                            self.backup_path.display(),
                            e,
                            self.records.len()
                        );
                        PersistOutcome::InMemoryOnly
                    }
                }
            }
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }
}

/// Returns the backup file for a partition: same directory, `backup_` prefix
pub fn backup_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("backup_{}", name))
}

/// Reads a partition file
///
/// # Returns
///
/// * `Ok(Some(records))` - The file exists and parsed
/// * `Ok(None)` - The file does not exist
/// * `Err(StorageError)` - The file could not be read or parsed
pub fn read_records(path: &Path) -> StorageResult<Option<Vec<Record>>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Serializes records as human-readable JSON with four-space indentation
fn serialize_records(records: &[Record]) -> serde_json::Result<Vec<u8>> {
    let mut body = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut body, formatter);
    records.serialize(&mut serializer)?;
    Ok(body)
}

/// Writes `body` to a sibling temporary file, then renames it over `path`
fn write_atomically(path: &Path, body: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, body)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}
