//! Logging module
//!
//! Each worker gets its own log handle instead of a shared global logger:
//! - A console layer, prefixed by the worker's span
//! - A file layer writing `<log-dir>/worker_<ordinal>/<yymmdd>.log`
//!
//! The handle is a `tracing::Dispatch` that the fleet attaches to the worker
//! future, so nothing a worker logs reaches another worker's file.

mod rotating;

pub use rotating::RotatingFile;

use crate::config::OutputConfig;
use crate::{CrawlError, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Returns the filter directive for a verbosity level
///
/// `-q` shows errors only; each `-v` lowers the crate's level by one step.
pub fn filter_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "kc_certcrawl=info,warn",
        1 => "kc_certcrawl=debug,info",
        2 => "kc_certcrawl=trace,debug",
        _ => "trace",
    }
}

/// Log file name for the day the worker started, e.g. `240115.log`
pub fn log_file_name(now: DateTime<Local>) -> String {
    format!("{}.log", now.format("%y%m%d"))
}

/// A worker's private log handle
///
/// Dropping it flushes and closes the worker's log file.
pub struct WorkerLog {
    dispatch: Dispatch,
    path: PathBuf,
    _guard: WorkerGuard,
}

impl WorkerLog {
    /// Builds the log handle for one worker
    ///
    /// # Arguments
    ///
    /// * `output` - Log directory and rotation limits
    /// * `ordinal` - The worker's ordinal (names its log folder)
    /// * `filter` - An `EnvFilter` directive, see `filter_directive`
    ///
    /// # Returns
    ///
    /// * `Ok(WorkerLog)` - The file is open and the dispatch is ready
    /// * `Err(CrawlError::Logging)` - The log file could not be opened
    pub fn new(output: &OutputConfig, ordinal: usize, filter: &str) -> Result<Self> {
        let path = output
            .worker_log_dir(ordinal)
            .join(log_file_name(Local::now()));

        let file = RotatingFile::open(&path, output.log_max_bytes, output.log_retained)
            .map_err(|e| {
                CrawlError::Logging(format!("cannot open {}: {}", path.display(), e))
            })?;
        let (writer, guard) = tracing_appender::non_blocking(file);

        let subscriber = Registry::default()
            .with(EnvFilter::new(filter))
            .with(fmt::layer().with_target(false))
            .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(false));

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            path,
            _guard: guard,
        })
    }

    /// The dispatch to attach to the worker's future
    pub fn dispatch(&self) -> Dispatch {
        self.dispatch.clone()
    }

    /// The file this handle writes to
    pub fn path(&self) -> &Path {
        &self.path
    }
}
