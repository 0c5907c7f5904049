// src/services/worker.rs

//! Per-target pagination.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{Row, ScraperConfig, Target, TargetAccumulator};
use crate::pipeline::ProgressTracker;
use crate::services::{HeaderPool, PageSource};
use crate::utils::{jitter, pause};

/// Pagination and pacing settings.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub max_pages: u32,
    /// A page with fewer rows than this is the last one
    pub full_page_threshold: usize,
    pub page_retry_min: f64,
    pub page_retry_max: f64,
    pub page_pause_min: f64,
    pub page_pause_max: f64,
}

impl From<&ScraperConfig> for WorkerSettings {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            max_pages: config.max_pages_per_target,
            full_page_threshold: config.full_page_threshold,
            page_retry_min: config.page_retry_min,
            page_retry_max: config.page_retry_max,
            page_pause_min: config.page_pause_min,
            page_pause_max: config.page_pause_max,
        }
    }
}

/// Walks one target's pages in order and collects their rows.
pub struct TargetWorker {
    source: Arc<dyn PageSource>,
    headers: Arc<HeaderPool>,
    settings: WorkerSettings,
    cancel: CancellationToken,
}

impl TargetWorker {
    pub fn new(
        source: Arc<dyn PageSource>,
        headers: Arc<HeaderPool>,
        settings: WorkerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            headers,
            settings,
            cancel,
        }
    }

    /// Fetch pages `1..=max_pages` of `target` on worker `slot`.
    ///
    /// An empty page is retried until it yields rows; only cancellation
    /// ends that loop. A short page ends pagination early.
    pub async fn run(
        &self,
        target: &Target,
        slot: usize,
        progress: &ProgressTracker,
    ) -> Result<TargetAccumulator> {
        let max_pages = self.settings.max_pages;
        let mut acc = TargetAccumulator::new(&target.name);

        for page in 1..=max_pages {
            progress.set_status(&target.name, format!("scraping page {}", page));
            let rows = self.fetch_until_rows(target, page, slot).await?;

            let count = rows.len();
            acc.append_page(rows);
            progress.complete_pages(1);
            progress.set_status(&target.name, format!("✓ {} players", count));

            if count < self.settings.full_page_threshold {
                let skipped = (max_pages - page) as usize;
                if skipped > 0 {
                    log::debug!(
                        "{}: page {} has {} rows, skipping {} remaining pages",
                        target.name,
                        page,
                        count,
                        skipped
                    );
                    progress.complete_pages(skipped);
                }
                break;
            }

            if page < max_pages {
                let wait = jitter(self.settings.page_pause_min, self.settings.page_pause_max);
                pause(wait, &self.cancel).await?;
            }
        }

        progress.complete_target(&target.name);
        log::info!(
            "{}: {} players over {} pages",
            target.name,
            acc.rows().len(),
            acc.pages_fetched()
        );
        Ok(acc)
    }

    async fn fetch_until_rows(
        &self,
        target: &Target,
        page: u32,
        slot: usize,
    ) -> Result<Vec<Row>> {
        let mut round = 1u64;
        loop {
            let rows = self.source.fetch(target, page, slot, &self.cancel).await?;
            if !rows.is_empty() {
                return Ok(rows);
            }

            log::warn!(
                "{}: page {} returned no data (round {}), retrying",
                target.name,
                page,
                round
            );
            let wait = jitter(self.settings.page_retry_min, self.settings.page_retry_max);
            pause(wait, &self.cancel).await?;
            self.headers.rotate(slot);
            round += 1;
        }
    }
}
