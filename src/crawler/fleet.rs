//! Fleet coordinator
//!
//! This module spawns one worker per ordinal and waits for all of them:
//! - Clamps the requested worker count to `MAX_WORKERS`
//! - Assigns each ordinal a direction through the `DirectionPolicy`
//! - Gives every worker its own session, partition, log handle and
//!   cancellation token (with its own Ctrl-C watcher)
//! - On Ctrl-C or shutdown, stops waiting once the grace period has elapsed

use crate::browser::{NavError, SessionFactory};
use crate::config::{Config, MAX_WORKERS};
use crate::crawler::pacing::guarded;
use crate::crawler::positioner::ResumePlan;
use crate::crawler::worker::{Worker, WorkerReport, WorkerSettings};
use crate::logging::WorkerLog;
use crate::state::{Direction, ExitReason, SlotAssignment};
use crate::storage::{new_persist_lock, read_records, PersistLock, RecordStore};
use crate::CrawlError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::Instrument;

/// Clamps a requested worker count into `1..=MAX_WORKERS`
pub fn clamp_workers(requested: usize) -> usize {
    if requested > MAX_WORKERS {
        tracing::warn!(
            "Requested {} workers, limited to {}",
            requested,
            MAX_WORKERS
        );
    }
    requested.clamp(1, MAX_WORKERS)
}

/// What one worker would do, computed without opening a session
#[derive(Debug, Clone)]
pub struct WorkerPlan {
    pub ordinal: usize,
    pub direction: Direction,
    pub slots: SlotAssignment,
    pub partition: PathBuf,
    pub existing: Option<usize>,
    pub resume: ResumePlan,
}

/// Computes the plan of every worker for `worker_count` workers
///
/// Partitions are read but never written. A partition that cannot be read
/// shows up with `existing: None`.
pub fn plan_workers(config: &Config, worker_count: usize) -> Vec<WorkerPlan> {
    let policy = config.crawler.direction_policy();

    (0..clamp_workers(worker_count))
        .map(|ordinal| {
            let direction = policy.direction_for(ordinal);
            let settings = WorkerSettings::from_config(config, ordinal, direction);
            let partition = config.output.partition_path(ordinal);
            let existing = match read_records(&partition) {
                Ok(records) => Some(records.map_or(0, |r| r.len())),
                Err(e) => {
                    tracing::warn!("Cannot read {}: {}", partition.display(), e);
                    None
                }
            };

            WorkerPlan {
                ordinal,
                direction,
                resume: settings.resume_plan(existing.unwrap_or(0)),
                slots: settings.slots,
                partition,
                existing,
            }
        })
        .collect()
}

/// Outcome of a whole fleet run
#[derive(Debug, Clone, Default)]
pub struct FleetSummary {
    /// One report per worker that finished, ordered by ordinal
    pub reports: Vec<WorkerReport>,

    /// True if the run was cut short by an interrupt
    pub interrupted: bool,
}

impl FleetSummary {
    pub fn total_accepted(&self) -> usize {
        self.reports.iter().map(|r| r.accepted).sum()
    }

    pub fn total_records(&self) -> usize {
        self.reports.iter().map(|r| r.total_records()).sum()
    }

    /// Logs one line per worker plus totals
    pub fn log(&self) {
        tracing::info!("=== Crawl summary ===");
        for report in &self.reports {
            tracing::info!("{}", report);
        }
        tracing::info!(
            "{} workers, {} records in partitions, {} new this run{}",
            self.reports.len(),
            self.total_records(),
            self.total_accepted(),
            if self.interrupted { " (interrupted)" } else { "" }
        );
    }
}

/// Spawns and supervises the crawl workers
pub struct Fleet<F: SessionFactory> {
    config: Arc<Config>,
    factory: Arc<F>,
    lock: PersistLock,
    log_filter: String,
    shutdown: CancellationToken,
    watch_ctrl_c: bool,
}

impl<F: SessionFactory + 'static> Fleet<F> {
    /// Creates a fleet over a session factory
    pub fn new(config: Config, factory: F) -> Self {
        Self {
            config: Arc::new(config),
            factory: Arc::new(factory),
            lock: new_persist_lock(),
            log_filter: crate::logging::filter_directive(0, false).to_string(),
            shutdown: CancellationToken::new(),
            watch_ctrl_c: true,
        }
    }

    /// Sets the filter directive for the per-worker log handles
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Enables or disables the Ctrl-C watchers
    pub fn with_ctrl_c(mut self, enabled: bool) -> Self {
        self.watch_ctrl_c = enabled;
        self
    }

    /// Token that cancels every worker of this fleet at once
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs `worker_count` workers to completion
    ///
    /// # Arguments
    ///
    /// * `worker_count` - Requested number of workers (clamped to `MAX_WORKERS`)
    ///
    /// # Returns
    ///
    /// The summary of every worker that reported before the fleet stopped
    /// waiting
    pub async fn run(&self, worker_count: usize) -> FleetSummary {
        let worker_count = clamp_workers(worker_count);
        let policy = self.config.crawler.direction_policy();

        tracing::info!("Starting {} workers", worker_count);

        let mut workers = JoinSet::new();
        for ordinal in 0..worker_count {
            let direction = policy.direction_for(ordinal);
            workers.spawn(self.worker_task(ordinal, direction));
        }

        let mut summary = FleetSummary::default();
        let grace = self.config.crawler.shutdown_grace();
        let mut deadline: Option<Instant> = None;
        let mut listen_ctrl_c = self.watch_ctrl_c;

        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok(report)) => {
                        tracing::info!("Worker {} terminated: {}", report.ordinal, report.exit);
                        summary.reports.push(report);
                    }
                    Some(Err(e)) => tracing::error!("Worker task failed: {}", e),
                    None => break,
                },
                signal = tokio::signal::ctrl_c(), if listen_ctrl_c && deadline.is_none() => {
                    deadline = grace_deadline(signal, grace);
                    match deadline {
                        Some(_) => summary.interrupted = true,
                        None => listen_ctrl_c = false,
                    }
                },
                _ = self.shutdown.cancelled(), if deadline.is_none() => {
                    tracing::warn!("Shutdown requested");
                    summary.interrupted = true;
                    deadline = Some(Instant::now() + grace);
                },
                _ = sleep_until(deadline) => {
                    // Still-running workers keep their tokens cancelled and
                    // release their own sessions after we return
                    tracing::warn!(
                        "Grace period elapsed, no longer waiting for {} workers",
                        workers.len()
                    );
                    workers.detach_all();
                    break;
                },
            }
        }

        if summary
            .reports
            .iter()
            .any(|r| r.exit == ExitReason::Interrupted)
        {
            summary.interrupted = true;
        }
        summary.reports.sort_by_key(|r| r.ordinal);
        summary.log();
        summary
    }

    /// Builds the self-contained future of one worker
    fn worker_task(
        &self,
        ordinal: usize,
        direction: Direction,
    ) -> impl std::future::Future<Output = WorkerReport> + Send + 'static {
        let config = Arc::clone(&self.config);
        let factory = Arc::clone(&self.factory);
        let lock = self.lock.clone();
        let cancel = self.shutdown.child_token();
        let watch_ctrl_c = self.watch_ctrl_c;

        // Per-worker log handle; fall back to the global subscriber
        let log = match WorkerLog::new(&config.output, ordinal, &self.log_filter) {
            Ok(log) => Some(log),
            Err(e) => {
                tracing::warn!("Worker {} logs to the console only: {}", ordinal, e);
                None
            }
        };
        let dispatch = log
            .as_ref()
            .map(WorkerLog::dispatch)
            .unwrap_or_else(|| tracing::dispatcher::get_default(|d| d.clone()));

        async move {
            let _log = log;

            let watcher = watch_ctrl_c
                .then(|| tokio::spawn(watch_interrupt(cancel.clone()).with_current_subscriber()));

            let span = tracing::info_span!("worker", ordinal);
            let report = run_worker(config, factory, lock, ordinal, direction, cancel)
                .instrument(span)
                .await;

            if let Some(watcher) = watcher {
                watcher.abort();
            }
            report
        }
        .with_subscriber(dispatch)
    }
}

/// Opens the worker's session and runs it
async fn run_worker<F: SessionFactory>(
    config: Arc<Config>,
    factory: Arc<F>,
    lock: PersistLock,
    ordinal: usize,
    direction: Direction,
    cancel: CancellationToken,
) -> WorkerReport {
    let navigator = match guarded(&cancel, factory.open(ordinal)).await {
        Ok(navigator) => navigator,
        Err(NavError::Interrupted) => {
            tracing::info!("Interrupted before the session was opened");
            return WorkerReport::start_failed(ordinal, direction, ExitReason::Interrupted);
        }
        Err(source) => {
            let error = CrawlError::SessionStart { ordinal, source };
            tracing::error!("{}", error);
            let exit = ExitReason::StartFailed(error.to_string());
            return WorkerReport::start_failed(ordinal, direction, exit);
        }
    };

    let settings = WorkerSettings::from_config(&config, ordinal, direction);
    let store = RecordStore::new(
        config.output.partition_path(ordinal),
        config.schema.id_label.clone(),
        lock,
    );

    Worker::new(settings, navigator, store, cancel).run().await
}

/// Cancels one worker's token on Ctrl-C
async fn watch_interrupt(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                tracing::info!("Interrupted by user");
                cancel.cancel();
            }
            Err(e) => tracing::warn!("Cannot listen for Ctrl-C: {}", e),
        },
        _ = cancel.cancelled() => {}
    }
}

/// Deadline to stop waiting at after a Ctrl-C, or None if the signal
/// handler could not be installed
fn grace_deadline(signal: std::io::Result<()>, grace: Duration) -> Option<Instant> {
    match signal {
        Ok(()) => {
            tracing::warn!(
                "Interrupted, waiting up to {:?} for workers to release their sessions",
                grace
            );
            Some(Instant::now() + grace)
        }
        Err(e) => {
            tracing::warn!("Cannot listen for Ctrl-C: {}", e);
            None
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
