//! Resume positioning
//!
//! A worker that restarts with `k` saved records has already walked about
//! `k` pages of its direction. Instead of stepping through them one at a time
//! it replays `k / page_size` bulk jumps, each made of one ten-page block
//! control followed by one single-page step.

use crate::browser::{Locator, NavError, NavResult, PageNavigator, WaitMode};
use crate::config::SiteConfig;
use crate::crawler::pacing::{guarded, pause};
use crate::state::Direction;
use crate::{CrawlError, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Number of bulk jump cycles to replay before iterating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePlan {
    pub cycles: usize,
}

impl ResumePlan {
    /// Plan for a worker that captures one record per page
    ///
    /// # Arguments
    ///
    /// * `existing` - Records already in the worker's partition
    /// * `page_size` - Rows rendered on one listing page
    pub fn new(existing: usize, page_size: usize) -> Self {
        if page_size == 0 {
            return Self { cycles: 0 };
        }
        Self {
            cycles: existing / page_size,
        }
    }

    /// Plan for a worker that captures `slots_per_page` records per page
    ///
    /// The saved records are first converted to pages walked, then to cycles.
    /// With one slot per page this is exactly `ResumePlan::new`.
    pub fn for_pages(existing: usize, slots_per_page: usize, page_size: usize) -> Self {
        let pages = existing / slots_per_page.max(1);
        Self::new(pages, page_size)
    }

    pub fn is_noop(&self) -> bool {
        self.cycles == 0
    }
}

/// Replays a `ResumePlan` on a worker's session
#[derive(Debug, Clone)]
pub struct ResumePositioner {
    block: Locator,
    step: Locator,
    loading: Locator,
    delay: Duration,
    timeout: Duration,
}

impl ResumePositioner {
    /// Builds the positioner for one direction
    ///
    /// Forward workers jump to the next ten-page block and then step to the
    /// next page; backward workers jump to the first page of the current
    /// block and then step to the previous page.
    pub fn new(site: &SiteConfig, direction: Direction, delay: Duration, timeout: Duration) -> Self {
        let (block, step) = match direction {
            Direction::Forward => (site.next_block.clone(), site.next_page.clone()),
            Direction::Backward => (site.block_first_page.clone(), site.previous_page.clone()),
        };

        Self {
            block,
            step,
            loading: site.loading.clone(),
            delay,
            timeout,
        }
    }

    /// Executes every cycle of the plan in order
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of cycles executed (equal to `plan.cycles`)
    /// * `Err(CrawlError::Positioning)` - A cycle failed; the worker cannot
    ///   know where it is and must stop
    pub async fn run<N: PageNavigator>(
        &self,
        navigator: &mut N,
        plan: ResumePlan,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if plan.is_noop() {
            tracing::info!("No resume positioning needed");
            return Ok(0);
        }

        tracing::info!("Replaying {} jump cycles to reach the resume position", plan.cycles);

        for completed in 0..plan.cycles {
            if let Err(source) = self.cycle(navigator, cancel).await {
                return Err(CrawlError::Positioning {
                    completed,
                    planned: plan.cycles,
                    source,
                });
            }
            tracing::debug!("Jump cycle {}/{} done", completed + 1, plan.cycles);
        }

        tracing::info!("Resume position reached after {} cycles", plan.cycles);
        Ok(plan.cycles)
    }

    async fn cycle<N: PageNavigator>(
        &self,
        navigator: &mut N,
        cancel: &CancellationToken,
    ) -> NavResult<()> {
        guarded(
            cancel,
            navigator.wait(&self.loading, WaitMode::Invisible, self.timeout),
        )
        .await?;

        self.click_control(navigator, &self.block, cancel).await?;
        pause(cancel, self.delay).await?;

        self.click_control(navigator, &self.step, cancel).await?;
        pause(cancel, self.delay).await
    }

    async fn click_control<N: PageNavigator>(
        &self,
        navigator: &mut N,
        control: &Locator,
        cancel: &CancellationToken,
    ) -> NavResult<()> {
        let found = guarded(
            cancel,
            navigator.wait(control, WaitMode::Clickable, self.timeout),
        )
        .await?;
        let element = found
            .into_iter()
            .next()
            .ok_or_else(|| NavError::NotFound(control.to_string()))?;
        guarded(cancel, navigator.click(&element)).await
    }
}
