//! Storage module for persisting crawled records
//!
//! This module handles:
//! - The certification record data model
//! - Per-worker JSON partitions with immediate, full-file persistence
//! - Backup-file fallback when the primary partition cannot be written
//! - The identifier set used to skip already-captured certificates

mod partition;
mod record;

pub use partition::{
    backup_path_for, new_persist_lock, read_records, PersistLock, PersistOutcome, RecordStore,
};
pub use record::{normalize_id, Factory, Record, RelatedCertificate};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Partition {path} is not valid record JSON: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
