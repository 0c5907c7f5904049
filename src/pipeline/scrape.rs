// src/pipeline/scrape.rs

//! Leaderboard scraping run: load inputs, schedule targets, persist
//! summaries, report.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Config, RunReport, TargetAccumulator, TargetSummary, load_header_profiles, load_targets};
use crate::pipeline::{ProgressTracker, ScheduleOutcome, Scheduler, SchedulerSettings, TargetSink};
use crate::services::{
    FetchSettings, HeaderPool, PageFetcher, RateLimiter, SessionCache, TargetWorker,
};
use crate::storage::SummaryStorage;
use crate::utils::log as console;

/// Refresh period of the live status line.
const TICK: Duration = Duration::from_secs(1);

/// Writes each non-empty target to storage as soon as it finishes.
pub struct Persister {
    storage: Arc<dyn SummaryStorage>,
    progress: Arc<ProgressTracker>,
}

impl Persister {
    pub fn new(storage: Arc<dyn SummaryStorage>, progress: Arc<ProgressTracker>) -> Self {
        Self { storage, progress }
    }

    async fn persist(&self, acc: &TargetAccumulator) -> Result<TargetSummary> {
        let summary = acc.summarize(Local::now())?;
        let path = self.storage.write_summary(&summary).await?;
        console::success(&format!(
            "{}: {} players, {} total KC -> {}",
            summary.target_name,
            summary.player_count,
            summary.total_score,
            path.display()
        ));
        Ok(summary)
    }
}

#[async_trait]
impl TargetSink for Persister {
    async fn accept(&self, acc: TargetAccumulator) -> Result<Option<TargetSummary>> {
        if acc.is_empty() {
            log::warn!("{}: no rows collected, nothing saved", acc.target_name());
            return Ok(None);
        }

        self.progress.set_status(acc.target_name(), "saving");
        let result = self.persist(&acc).await;
        self.progress.clear_status(acc.target_name());

        match result {
            Ok(summary) => Ok(Some(summary)),
            Err(e) => {
                console::failure(&format!("{}: could not save summary: {}", acc.target_name(), e));
                Err(e)
            }
        }
    }
}

/// Re-render the status line every second until `stop` fires.
fn spawn_ticker(progress: Arc<ProgressTracker>, stop: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                _ = interval.tick() => console::progress(&progress.snapshot().status_line()),
                _ = stop.cancelled() => break,
            }
        }
        console::clear_line();
    })
}

/// Run the scraper over every configured target.
///
/// Fails only if no targets could be loaded or the HTTP stack cannot be
/// built. Per-target failures end up in the returned report.
pub async fn run_scraper(
    config: &Config,
    storage: Arc<dyn SummaryStorage>,
    cancel: CancellationToken,
) -> Result<RunReport> {
    let started_at = Local::now();
    console::header("Leaderboard scraper");

    let targets = load_targets(&config.paths.targets_file);
    if targets.is_empty() {
        return Err(AppError::config(format!(
            "No targets loaded from {}",
            config.paths.targets_file
        )));
    }

    let headers = Arc::new(HeaderPool::new(load_header_profiles(
        &config.paths.headers_file,
    )));
    let scraper = &config.scraper;
    console::sub_item(&format!("Targets: {}", targets.len()));
    console::sub_item(&format!("Header profiles: {}", headers.count()));
    console::sub_item(&format!(
        "Workers: {}, max pages: {}, max requests/min: {}",
        scraper.worker_count, scraper.max_pages_per_target, scraper.max_requests_per_minute
    ));

    let fetcher = PageFetcher::new(
        Arc::new(RateLimiter::new(scraper.max_requests_per_minute)),
        Arc::new(SessionCache::new(scraper.into())),
        Arc::clone(&headers),
        FetchSettings::new(scraper, &config.retry),
    )?;
    let worker = TargetWorker::new(
        Arc::new(fetcher),
        headers,
        scraper.into(),
        cancel.clone(),
    );

    let total_targets = targets.len();
    let progress = Arc::new(ProgressTracker::new(total_targets, scraper.max_pages_per_target));
    let scheduler = Scheduler::new(
        Arc::new(worker),
        Arc::clone(&progress),
        SchedulerSettings::from(scraper),
        cancel.clone(),
    );
    let persister = Persister::new(Arc::clone(&storage), Arc::clone(&progress));

    let ticker_stop = CancellationToken::new();
    let ticker = config
        .logging
        .show_progress
        .then(|| spawn_ticker(Arc::clone(&progress), ticker_stop.clone()));

    let outcome = scheduler.run(targets, &persister).await;

    ticker_stop.cancel();
    if let Some(ticker) = ticker {
        if let Err(e) = ticker.await {
            log::debug!("Progress ticker ended abnormally: {}", e);
        }
    }

    let report = build_report(started_at, total_targets, &progress, outcome);
    if let Err(e) = storage.write_report(&report).await {
        log::warn!("Could not write run report: {}", e);
    }
    print_summary(&report, &progress);

    Ok(report)
}

fn build_report(
    started_at: chrono::DateTime<Local>,
    total_targets: usize,
    progress: &ProgressTracker,
    outcome: ScheduleOutcome,
) -> RunReport {
    RunReport {
        started_at,
        finished_at: Local::now(),
        total_targets,
        completed_pages: progress.snapshot().completed_pages,
        successful: outcome
            .summaries
            .into_iter()
            .map(|s| s.target_name)
            .collect(),
        failed: outcome.failed,
        interrupted: outcome.interrupted,
    }
}

fn print_summary(report: &RunReport, progress: &ProgressTracker) {
    let elapsed = console::format_elapsed(report.elapsed_secs().max(0.0) as u64);

    if report.interrupted {
        let snap = progress.snapshot();
        console::summary(
            "Interrupted",
            &[
                (
                    "Targets completed",
                    format!("{}/{}", snap.completed_targets, snap.total_targets),
                ),
                ("Pages completed", format!("{}/{}", snap.completed_pages, snap.total_pages)),
                ("Saved", report.successful.len().to_string()),
                ("Elapsed", elapsed),
            ],
        );
        return;
    }

    console::summary(
        "Scrape complete",
        &[
            (
                "Successful",
                format!("{}/{}", report.successful.len(), report.total_targets),
            ),
            ("Failed", report.failed.len().to_string()),
            ("Elapsed", elapsed),
            (
                "Average per target",
                format!("{:.1}s", report.average_secs_per_target()),
            ),
        ],
    );
    if !report.failed.is_empty() {
        console::sub_item(&format!("Failed targets: {}", report.failed.join(", ")));
    }
}
