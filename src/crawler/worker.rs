//! Crawl worker - one session walking the listing in one direction
//!
//! A worker owns everything it touches: its rendering session, its partition,
//! its extractor and its cancellation token. Its lifecycle is:
//! - Starting: open the listing, load the partition, move to the start page
//! - Positioning: replay bulk jumps to the resume position
//! - Iterating: process the assigned row slot(s), then step one page
//! - Draining: release the session
//! - Terminated

use crate::browser::{NavError, NavResult, PageNavigator, WaitMode};
use crate::config::{Config, SiteConfig};
use crate::crawler::extractor::{DetailExtractor, DetailSchema};
use crate::crawler::pacing::{guarded, pause};
use crate::crawler::positioner::{ResumePlan, ResumePositioner};
use crate::state::{Direction, ExitReason, SlotAssignment, WorkerState};
use crate::storage::{normalize_id, PersistOutcome, RecordStore};
use crate::{CrawlError, Result};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything a worker needs to know about its assignment and the site
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub ordinal: usize,
    pub direction: Direction,
    pub slots: SlotAssignment,
    pub page_size: usize,
    pub site: SiteConfig,
    pub schema: DetailSchema,
    pub politeness_delay: Duration,
    pub wait_timeout: Duration,
}

impl WorkerSettings {
    /// Derives a worker's settings from the crawl configuration
    pub fn from_config(config: &Config, ordinal: usize, direction: Direction) -> Self {
        let page_size = config.crawler.page_size;
        let slots = if config.crawler.sweep {
            SlotAssignment::Sweep
        } else {
            SlotAssignment::for_ordinal(ordinal, page_size)
        };

        Self {
            ordinal,
            direction,
            slots,
            page_size,
            site: config.site.clone(),
            schema: DetailSchema::from(&config.schema),
            politeness_delay: config.crawler.politeness_delay(),
            wait_timeout: config.crawler.wait_timeout(),
        }
    }

    /// Plan the worker will replay for a partition of `existing` records
    pub fn resume_plan(&self, existing: usize) -> ResumePlan {
        ResumePlan::for_pages(
            existing,
            self.slots.slots_per_page(self.page_size),
            self.page_size,
        )
    }
}

/// Result of one iteration cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The page was processed and the next one is loaded
    Continue,

    /// No further page could be reached
    EndOfListing,

    /// The worker cannot go on
    Fatal(ExitReason),
}

/// Result of processing one row slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// The row's certificate was already in the partition
    Skipped,

    /// A new record was captured and persisted
    Accepted(PersistOutcome),

    /// The detail page carried a certificate number already captured
    Duplicate,

    /// The detail page had no certificate number
    MissingId,

    /// The page rendered fewer rows than the slot index
    SlotMissing,
}

/// Final account of a worker's run
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub ordinal: usize,
    pub direction: Direction,
    pub final_state: WorkerState,
    pub exit: ExitReason,
    pub loaded: usize,
    pub accepted: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub pages_advanced: usize,
}

impl WorkerReport {
    /// Report for a worker that never got a session
    pub fn start_failed(ordinal: usize, direction: Direction, exit: ExitReason) -> Self {
        Self {
            ordinal,
            direction,
            final_state: WorkerState::Terminated,
            exit,
            loaded: 0,
            accepted: 0,
            skipped: 0,
            duplicates: 0,
            pages_advanced: 0,
        }
    }

    /// Records in the partition when the worker stopped
    pub fn total_records(&self) -> usize {
        self.loaded + self.accepted
    }
}

impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worker {:>2} {:<8} {:<10} loaded {:>6}  new {:>5}  skipped {:>5}  pages {:>6}  ({})",
            self.ordinal,
            self.direction.as_str(),
            self.final_state.as_str(),
            self.loaded,
            self.accepted,
            self.skipped,
            self.pages_advanced,
            self.exit
        )
    }
}

/// Maps a fatal navigator error to the reason the worker stops
fn exit_reason_for(error: &NavError) -> ExitReason {
    match error {
        NavError::Interrupted => ExitReason::Interrupted,
        other => ExitReason::SessionClosed(other.to_string()),
    }
}

/// A single crawl worker
pub struct Worker<N: PageNavigator> {
    settings: WorkerSettings,
    navigator: N,
    store: RecordStore,
    extractor: DetailExtractor,
    cancel: CancellationToken,
    state: WorkerState,
    loaded: usize,
    accepted: usize,
    skipped: usize,
    duplicates: usize,
    pages_advanced: usize,
}

impl<N: PageNavigator> Worker<N> {
    /// Creates a worker around an open session and an unloaded partition
    ///
    /// # Arguments
    ///
    /// * `settings` - Assignment and site layout
    /// * `navigator` - The session this worker owns exclusively
    /// * `store` - The worker's partition (loaded during `Starting`)
    /// * `cancel` - Token that interrupts every wait and pause
    pub fn new(
        settings: WorkerSettings,
        navigator: N,
        store: RecordStore,
        cancel: CancellationToken,
    ) -> Self {
        let extractor = DetailExtractor::new(settings.schema.clone());
        Self {
            settings,
            navigator,
            store,
            extractor,
            cancel,
            state: WorkerState::Starting,
            loaded: 0,
            accepted: 0,
            skipped: 0,
            duplicates: 0,
            pages_advanced: 0,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Runs the worker to completion
    ///
    /// Never fails: every way the crawl can end is reported through the
    /// returned `WorkerReport`, and the session is always released.
    pub async fn run(mut self) -> WorkerReport {
        tracing::info!(
            "Start crawling - partition: {} (direction: {}, ordinal: {}, slots: {:?})",
            self.store.path().display(),
            self.settings.direction,
            self.settings.ordinal,
            self.settings.slots.slots(self.settings.page_size)
        );

        let exit = self.crawl().await;
        if exit.is_normal() {
            tracing::info!("Crawl loop ended: {}", exit);
        } else {
            tracing::error!("Crawl loop ended: {}", exit);
        }

        self.enter(WorkerState::Draining);
        self.release().await;
        self.enter(WorkerState::Terminated);

        tracing::info!(
            "Worker {} finished with {} records ({} new)",
            self.settings.ordinal,
            self.store.len(),
            self.accepted
        );

        WorkerReport {
            ordinal: self.settings.ordinal,
            direction: self.settings.direction,
            final_state: self.state,
            exit,
            loaded: self.loaded,
            accepted: self.accepted,
            skipped: self.skipped,
            duplicates: self.duplicates,
            pages_advanced: self.pages_advanced,
        }
    }

    /// Moves to `next`, enforcing the lifecycle transition table
    fn transition(&mut self, next: WorkerState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Worker state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn enter(&mut self, next: WorkerState) {
        if let Err(e) = self.transition(next) {
            tracing::error!("{}", e);
        }
    }

    /// Runs Starting, Positioning and Iterating; returns why the loop ended
    async fn crawl(&mut self) -> ExitReason {
        // Starting
        if let Err(e) = self.start().await {
            return match e {
                CrawlError::Navigation(nav) if nav.is_fatal() => exit_reason_for(&nav),
                other => ExitReason::StartFailed(other.to_string()),
            };
        }

        // Positioning
        self.enter(WorkerState::Positioning);
        let plan = self.settings.resume_plan(self.store.len());
        let positioner = ResumePositioner::new(
            &self.settings.site,
            self.settings.direction,
            self.settings.politeness_delay,
            self.settings.wait_timeout,
        );
        if let Err(e) = positioner.run(&mut self.navigator, plan, &self.cancel).await {
            return match e {
                CrawlError::Positioning {
                    source: NavError::Interrupted,
                    ..
                } => ExitReason::Interrupted,
                other => ExitReason::PositioningFailed(other.to_string()),
            };
        }

        // Iterating
        self.enter(WorkerState::Iterating);
        loop {
            match self.run_cycle().await {
                CycleOutcome::Continue => continue,
                CycleOutcome::EndOfListing => return ExitReason::EndOfListing,
                CycleOutcome::Fatal(reason) => return reason,
            }
        }
    }

    /// Opens the listing, loads the partition, and moves to the start page
    async fn start(&mut self) -> Result<()> {
        let site = &self.settings.site;
        let timeout = self.settings.wait_timeout;

        guarded(&self.cancel, self.navigator.go(&site.listing_url)).await?;

        // Load existing records
        self.loaded = self.store.load()?;

        if self.settings.direction == Direction::Backward {
            let found = guarded(
                &self.cancel,
                self.navigator.wait(&site.last_page, WaitMode::Clickable, timeout),
            )
            .await?;
            let last_page = found
                .into_iter()
                .next()
                .ok_or_else(|| NavError::NotFound(site.last_page.to_string()))?;
            guarded(&self.cancel, self.navigator.click(&last_page)).await?;
            pause(&self.cancel, self.settings.politeness_delay).await?;
            tracing::info!("Moved to the last listing page");
        }

        Ok(())
    }

    /// Processes the worker's slot(s) on the current page, then advances
    async fn run_cycle(&mut self) -> CycleOutcome {
        for slot in self.settings.slots.slots(self.settings.page_size) {
            match self.process_row(slot).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return CycleOutcome::Fatal(exit_reason_for(&e)),
                Err(e) => tracing::error!("Row processing error (slot {}): {}", slot, e),
            }
        }

        match self.advance().await {
            Ok(()) => CycleOutcome::Continue,
            Err(e) if e.is_fatal() => CycleOutcome::Fatal(exit_reason_for(&e)),
            Err(e) => {
                tracing::info!("No further page: {}", e);
                CycleOutcome::EndOfListing
            }
        }
    }

    fn count(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Skipped => self.skipped += 1,
            RowOutcome::Accepted(_) => self.accepted += 1,
            RowOutcome::Duplicate => self.duplicates += 1,
            RowOutcome::MissingId | RowOutcome::SlotMissing => {}
        }
    }

    /// Captures the record behind one row of the current listing page
    ///
    /// The row's outcome is counted as soon as it is known, so a record that
    /// reached the partition is reported even if the return trip fails.
    async fn process_row(&mut self, slot: usize) -> NavResult<()> {
        let site = &self.settings.site;
        let timeout = self.settings.wait_timeout;

        let rows = guarded(
            &self.cancel,
            self.navigator.wait(&site.rows, WaitMode::AllPresent, timeout),
        )
        .await?;

        let Some(row) = rows.get(slot) else {
            tracing::error!("Invalid row index: {}, total rows: {}", slot, rows.len());
            self.count(RowOutcome::SlotMissing);
            return Ok(());
        };

        let raw_id = guarded(
            &self.cancel,
            self.navigator.element_text(row, Some(&site.row_id_cell)),
        )
        .await?;
        let id = normalize_id(&raw_id);

        if self.store.contains(&id) {
            tracing::info!("Skip existing cert number: {}", id);
            self.count(RowOutcome::Skipped);
            return Ok(());
        }

        pause(&self.cancel, self.settings.politeness_delay).await?;
        guarded(&self.cancel, self.navigator.click(row)).await?;

        let detail_error = match self.capture_detail(slot).await {
            Ok(outcome) => {
                self.count(outcome);
                None
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => Some(e),
        };

        // Always return to the listing, whatever happened on the detail page
        pause(&self.cancel, self.settings.politeness_delay).await?;
        if let Err(e) = self.return_to_listing().await {
            if e.is_fatal() {
                return Err(e);
            }
            tracing::warn!("Return to listing failed, retrying once: {}", e);
            self.return_to_listing().await?;
        }

        detail_error.map_or(Ok(()), Err)
    }

    /// Navigates back from a detail page and waits for the listing
    async fn return_to_listing(&mut self) -> NavResult<()> {
        guarded(&self.cancel, self.navigator.go_back()).await?;
        guarded(
            &self.cancel,
            self.navigator.wait(
                &self.settings.site.listing,
                WaitMode::Present,
                self.settings.wait_timeout,
            ),
        )
        .await?;
        Ok(())
    }

    /// Extracts the open detail page and persists it if unseen
    async fn capture_detail(&mut self, slot: usize) -> NavResult<RowOutcome> {
        guarded(
            &self.cancel,
            self.navigator.wait(
                &self.settings.site.detail_content,
                WaitMode::Present,
                self.settings.wait_timeout,
            ),
        )
        .await?;
        let markup = guarded(&self.cancel, self.navigator.current_markup()).await?;

        let record = self.extractor.extract(&markup);
        let Some(id) = record.certificate_number(&self.settings.schema.id_label) else {
            tracing::warn!(
                "Detail page without '{}' (slot {})",
                self.settings.schema.id_label,
                slot
            );
            return Ok(RowOutcome::MissingId);
        };

        if self.store.contains(&id) {
            tracing::info!("Skip duplicate cert number: {}", id);
            return Ok(RowOutcome::Duplicate);
        }

        let outcome = self.store.append_and_persist(record);
        tracing::info!(
            "Added new cert number: {} [{}] (slot: {})",
            id,
            self.store.len(),
            slot
        );
        Ok(RowOutcome::Accepted(outcome))
    }

    /// Steps one page in the worker's direction
    async fn advance(&mut self) -> NavResult<()> {
        let site = &self.settings.site;
        let timeout = self.settings.wait_timeout;
        let step = match self.settings.direction {
            Direction::Forward => &site.next_page,
            Direction::Backward => &site.previous_page,
        };

        guarded(
            &self.cancel,
            self.navigator.wait(&site.loading, WaitMode::Invisible, timeout),
        )
        .await?;
        let found = guarded(
            &self.cancel,
            self.navigator.wait(step, WaitMode::Clickable, timeout),
        )
        .await?;
        let control = found
            .into_iter()
            .next()
            .ok_or_else(|| NavError::NotFound(step.to_string()))?;
        guarded(&self.cancel, self.navigator.click(&control)).await?;
        pause(&self.cancel, self.settings.politeness_delay).await?;

        self.pages_advanced += 1;
        Ok(())
    }

    /// Shuts the session down; failures are logged and otherwise ignored
    async fn release(&mut self) {
        let limit = self.settings.wait_timeout;
        match tokio::time::timeout(limit, self.navigator.shutdown()).await {
            Ok(Ok(())) => tracing::debug!("Session released"),
            Ok(Err(e)) => tracing::warn!("Failed to release session: {}", e),
            Err(_) => tracing::warn!("Session release timed out after {:?}", limit),
        }
    }
}
