//! kc-certcrawl: a resumable, multi-worker certification record crawler
//!
//! This crate drives a fleet of browser sessions over a paginated certification
//! listing, extracts each detail page into a structured record, and persists
//! every worker's records into its own JSON partition so interrupted runs can
//! resume where they left off.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod logging;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for kc-certcrawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] browser::NavError),

    #[error("Resume positioning failed after {completed} of {planned} jump cycles: {source}")]
    Positioning {
        completed: usize,
        planned: usize,
        source: browser::NavError,
    },

    #[error("Failed to open rendering session for worker {ordinal}: {source}")]
    SessionStart {
        ordinal: usize,
        source: browser::NavError,
    },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::WorkerState,
        to: state::WorkerState,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for kc-certcrawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{Direction, DirectionPolicy, ExitReason, WorkerState};
pub use storage::{Record, RecordStore};
