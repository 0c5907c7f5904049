// src/pipeline/scheduler.rs

//! Bounded-concurrency dispatch of target workers.
//!
//! At most `worker_count` targets run at once, each on a slot id in
//! `[0, worker_count)` that no other running target holds. Results are
//! handed to a [`TargetSink`] as they complete, in completion order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{ScraperConfig, Target, TargetAccumulator, TargetSummary};
use crate::pipeline::ProgressTracker;
use crate::services::TargetWorker;
use crate::utils::pause;

/// Receives each finished target's rows.
#[async_trait]
pub trait TargetSink: Send + Sync {
    /// Handle a completed target. `Ok(None)` means it had nothing worth
    /// keeping.
    async fn accept(&self, acc: TargetAccumulator) -> Result<Option<TargetSummary>>;
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub worker_count: usize,
    /// Completions between pacing pauses
    pub pace_every: usize,
    pub inter_batch_delay: Duration,
}

impl From<&ScraperConfig> for SchedulerSettings {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            worker_count: config.worker_count,
            pace_every: config.pace_every,
            inter_batch_delay: config.inter_batch_delay(),
        }
    }
}

/// What a scheduling run produced.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    /// Summaries accepted by the sink, in completion order
    pub summaries: Vec<TargetSummary>,
    /// Targets that crashed, came back empty or could not be stored
    pub failed: Vec<String>,
    /// Whether the run was cancelled before every target finished
    pub interrupted: bool,
}

struct Finished {
    slot: usize,
    target: String,
    result: std::result::Result<Result<TargetAccumulator>, JoinError>,
}

/// Runs targets through a fixed pool of worker slots.
pub struct Scheduler {
    worker: Arc<TargetWorker>,
    progress: Arc<ProgressTracker>,
    settings: SchedulerSettings,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        worker: Arc<TargetWorker>,
        progress: Arc<ProgressTracker>,
        settings: SchedulerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            worker,
            progress,
            settings,
            cancel,
        }
    }

    /// Scrape every target and feed the results to `sink`.
    ///
    /// A failing or panicking worker is reported and skipped. Cancellation
    /// stops dispatch; targets already running are drained.
    pub async fn run(&self, targets: Vec<Target>, sink: &dyn TargetSink) -> ScheduleOutcome {
        let worker_count = self.settings.worker_count.max(1);
        let mut queue: VecDeque<Target> = targets.into();
        let mut free_slots: Vec<usize> = (0..worker_count).rev().collect();
        let mut running = FuturesUnordered::new();
        let mut outcome = ScheduleOutcome::default();
        let mut completed = 0usize;

        log::info!(
            "Scheduling {} targets on {} workers",
            queue.len(),
            worker_count
        );

        loop {
            while !self.cancel.is_cancelled() && !free_slots.is_empty() {
                let Some(target) = queue.pop_front() else {
                    break;
                };
                let Some(slot) = free_slots.pop() else {
                    break;
                };
                running.push(self.launch(target, slot));
            }

            let Some(finished) = running.next().await else {
                break;
            };
            free_slots.push(finished.slot);
            self.settle(finished, sink, &mut outcome).await;

            completed += 1;
            let pace = self.settings.pace_every > 0 && completed % self.settings.pace_every == 0;
            if pace && !queue.is_empty() && !self.cancel.is_cancelled() {
                log::debug!(
                    "{} targets done, pausing {:?}",
                    completed,
                    self.settings.inter_batch_delay
                );
                // Cancellation is picked up by the dispatch check above.
                let _ = pause(self.settings.inter_batch_delay, &self.cancel).await;
            }
        }

        outcome.interrupted = self.cancel.is_cancelled();
        if !queue.is_empty() {
            log::warn!("{} targets were never started", queue.len());
        }
        outcome
    }

    fn launch(&self, target: Target, slot: usize) -> impl Future<Output = Finished> {
        let worker = Arc::clone(&self.worker);
        let progress = Arc::clone(&self.progress);
        let name = target.name.clone();
        log::debug!("Worker {} starting {}", slot, name);

        let handle = tokio::spawn(async move { worker.run(&target, slot, &progress).await });
        async move {
            Finished {
                slot,
                target: name,
                result: handle.await,
            }
        }
    }

    async fn settle(&self, finished: Finished, sink: &dyn TargetSink, outcome: &mut ScheduleOutcome) {
        let Finished { target, result, .. } = finished;
        match result {
            Ok(Ok(acc)) => match sink.accept(acc).await {
                Ok(Some(summary)) => outcome.summaries.push(summary),
                Ok(None) => outcome.failed.push(target),
                Err(e) => {
                    log::error!("{}: {}", target, e);
                    outcome.failed.push(target);
                }
            },
            Ok(Err(e)) if e.is_cancelled() => {
                log::info!("{}: interrupted", target);
                self.progress.clear_status(&target);
            }
            Ok(Err(e)) => {
                log::error!("{}: {}", target, e);
                self.progress.clear_status(&target);
                outcome.failed.push(target);
            }
            Err(e) => {
                log::error!("{}", AppError::worker(&target, e));
                self.progress.clear_status(&target);
                outcome.failed.push(target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Row;
    use crate::services::{HeaderPool, PageSource, WorkerSettings};
    use chrono::Local;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Serves one short page per target and panics for "Boom". Records
    /// slots that were busy twice at once.
    #[derive(Default)]
    struct SlotCheckingSource {
        busy: Mutex<HashSet<usize>>,
        overlaps: Mutex<Vec<usize>>,
        seen_slots: Mutex<HashSet<usize>>,
    }

    #[async_trait]
    impl PageSource for SlotCheckingSource {
        async fn fetch(
            &self,
            target: &Target,
            _page: u32,
            slot: usize,
            cancel: &CancellationToken,
        ) -> Result<Vec<Row>> {
            if target.name == "Boom" {
                panic!("parser exploded");
            }
            if !self.busy.lock().unwrap().insert(slot) {
                self.overlaps.lock().unwrap().push(slot);
            }
            self.seen_slots.lock().unwrap().insert(slot);
            let slept = pause(Duration::from_secs(2), cancel).await;
            self.busy.lock().unwrap().remove(&slot);
            slept?;

            if target.name.starts_with("Garbled") {
                return Ok(vec![Row::new("1", "x", "not-a-number")]);
            }
            Ok(vec![Row::new("1", "Alice", "1,234"), Row::new("2", "Bob", "56")])
        }
    }

    /// Summarizes in memory; "Garbled" targets fail to parse and "Hollow"
    /// targets are declined as having nothing worth keeping.
    #[derive(Default)]
    struct MemorySink {
        accepted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TargetSink for MemorySink {
        async fn accept(&self, acc: TargetAccumulator) -> Result<Option<TargetSummary>> {
            self.accepted.lock().unwrap().push(acc.target_name().to_string());
            if acc.target_name().starts_with("Hollow") {
                return Ok(None);
            }
            acc.summarize(Local::now()).map(Some)
        }
    }

    fn scheduler(
        source: Arc<SlotCheckingSource>,
        workers: usize,
        targets: usize,
        cancel: CancellationToken,
    ) -> Scheduler {
        let worker = TargetWorker::new(
            source,
            Arc::new(HeaderPool::new(Vec::new())),
            WorkerSettings {
                max_pages: 3,
                full_page_threshold: 25,
                page_retry_min: 0.5,
                page_retry_max: 2.0,
                page_pause_min: 3.0,
                page_pause_max: 7.0,
            },
            cancel.clone(),
        );
        Scheduler::new(
            Arc::new(worker),
            Arc::new(ProgressTracker::new(targets, 3)),
            SchedulerSettings {
                worker_count: workers,
                pace_every: 5,
                inter_batch_delay: Duration::from_millis(500),
            },
            cancel,
        )
    }

    fn targets(names: &[&str]) -> Vec<Target> {
        names
            .iter()
            .map(|n| Target::new(*n, format!("https://example.com/{n}")))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_slots_are_exclusive_and_bounded() {
        let source = Arc::new(SlotCheckingSource::default());
        let names: Vec<String> = (0..12).map(|i| format!("T{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let sink = MemorySink::default();

        let outcome = scheduler(Arc::clone(&source), 3, names.len(), CancellationToken::new())
            .run(targets(&names), &sink)
            .await;

        assert_eq!(outcome.summaries.len(), 12);
        assert!(outcome.failed.is_empty());
        assert!(!outcome.interrupted);
        assert!(source.overlaps.lock().unwrap().is_empty());
        let seen = source.seen_slots.lock().unwrap().clone();
        assert_eq!(seen, HashSet::from([0, 1, 2]));
        assert!(outcome.summaries.iter().all(|s| s.total_score == 1290));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_abort_batch() {
        let source = Arc::new(SlotCheckingSource::default());
        let sink = MemorySink::default();

        let outcome = scheduler(source, 2, 4, CancellationToken::new())
            .run(targets(&["Zulrah", "Boom", "Garbled Beast", "Vorkath"]), &sink)
            .await;

        let mut ok: Vec<&str> = outcome
            .summaries
            .iter()
            .map(|s| s.target_name.as_str())
            .collect();
        ok.sort();
        assert_eq!(ok, vec!["Vorkath", "Zulrah"]);

        let mut failed = outcome.failed.clone();
        failed.sort();
        assert_eq!(failed, vec!["Boom".to_string(), "Garbled Beast".to_string()]);
        // The panicking target never reached the sink.
        assert!(!sink.accepted.lock().unwrap().contains(&"Boom".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_declined_target_counts_as_failed() {
        let source = Arc::new(SlotCheckingSource::default());
        let sink = MemorySink::default();

        let outcome = scheduler(source, 2, 2, CancellationToken::new())
            .run(targets(&["Hollow Knight", "Kraken"]), &sink)
            .await;

        assert_eq!(outcome.summaries.len(), 1);
        assert_eq!(outcome.summaries[0].target_name, "Kraken");
        assert_eq!(outcome.failed, vec!["Hollow Knight".to_string()]);
        assert!(sink.accepted.lock().unwrap().contains(&"Hollow Knight".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_dispatch() {
        let source = Arc::new(SlotCheckingSource::default());
        let sink = MemorySink::default();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let outcome = scheduler(source, 1, 3, cancel)
            .run(targets(&["A", "B", "C"]), &sink)
            .await;

        assert!(outcome.interrupted);
        assert!(outcome.summaries.is_empty());
        assert!(outcome.failed.is_empty());
        assert!(sink.accepted.lock().unwrap().is_empty());
    }
}
