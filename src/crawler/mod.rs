//! Crawler module for walking the certification listing
//!
//! This module contains the core crawling logic, including:
//! - Detail page extraction into records
//! - Resume positioning from saved partition state
//! - The per-worker navigate, extract, persist, advance cycle
//! - Fleet coordination across directions

mod extractor;
mod fleet;
mod pacing;
mod positioner;
mod worker;

pub use extractor::{DetailExtractor, DetailSchema};
pub use fleet::{clamp_workers, plan_workers, Fleet, FleetSummary, WorkerPlan};
pub use pacing::{guarded, pause};
pub use positioner::{ResumePlan, ResumePositioner};
pub use worker::{CycleOutcome, RowOutcome, Worker, WorkerReport, WorkerSettings};

use crate::browser::WebDriverFactory;
use crate::config::Config;

/// Runs a complete crawl against the configured WebDriver server
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build a WebDriver session factory from the browser configuration
/// 2. Spawn `worker_count` workers, each on its own session and partition
/// 3. Wait for every worker to terminate (or the interrupt grace period)
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `worker_count` - Requested number of workers
/// * `log_filter` - Filter directive for the per-worker log handles
///
/// # Returns
///
/// The fleet summary with one report per worker
pub async fn crawl(config: Config, worker_count: usize, log_filter: &str) -> FleetSummary {
    let factory = WebDriverFactory::new(config.browser.clone());
    Fleet::new(config, factory)
        .with_log_filter(log_filter)
        .run(worker_count)
        .await
}
