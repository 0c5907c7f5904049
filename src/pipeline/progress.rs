// src/pipeline/progress.rs

//! Shared run progress.
//!
//! Workers report page and target completion here; the console ticker and
//! the final summary read consistent snapshots. The lock is only held for
//! the bookkeeping itself, never across I/O.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};
use tokio::time::Instant;

use crate::utils::log::format_elapsed;

/// Width of the rendered progress bar in characters.
const BAR_WIDTH: usize = 40;

/// Active targets shown on the status line.
const MAX_ACTIVE_SHOWN: usize = 3;

#[derive(Debug)]
struct ProgressState {
    completed_pages: usize,
    completed_targets: usize,
    /// Status of in-flight targets only
    per_target_status: BTreeMap<String, String>,
}

/// Thread-safe progress counters for one run.
#[derive(Debug)]
pub struct ProgressTracker {
    total_targets: usize,
    total_pages: usize,
    started: Instant,
    state: Mutex<ProgressState>,
}

impl ProgressTracker {
    pub fn new(total_targets: usize, max_pages_per_target: u32) -> Self {
        Self {
            total_targets,
            total_pages: total_targets.saturating_mul(max_pages_per_target as usize),
            started: Instant::now(),
            state: Mutex::new(ProgressState {
                completed_pages: 0,
                completed_targets: 0,
                per_target_status: BTreeMap::new(),
            }),
        }
    }

    /// Set the status text of an in-flight target.
    pub fn set_status(&self, target: &str, status: impl Into<String>) {
        self.lock()
            .per_target_status
            .insert(target.to_string(), status.into());
    }

    /// Count `pages` more pages as done.
    pub fn complete_pages(&self, pages: usize) {
        let mut state = self.lock();
        state.completed_pages = (state.completed_pages + pages).min(self.total_pages);
    }

    /// Count the target as done and drop its status entry.
    pub fn complete_target(&self, target: &str) {
        let mut state = self.lock();
        state.per_target_status.remove(target);
        state.completed_targets = (state.completed_targets + 1).min(self.total_targets);
    }

    /// Drop a target's status entry without counting it as done.
    pub fn clear_status(&self, target: &str) {
        self.lock().per_target_status.remove(target);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        ProgressSnapshot {
            total_targets: self.total_targets,
            completed_targets: state.completed_targets,
            total_pages: self.total_pages,
            completed_pages: state.completed_pages,
            active: state
                .per_target_status
                .iter()
                .map(|(name, status)| (name.clone(), status.clone()))
                .collect(),
            elapsed: self.started.elapsed(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time copy of the progress counters.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub total_targets: usize,
    pub completed_targets: usize,
    pub total_pages: usize,
    pub completed_pages: usize,
    /// `(target, status)` of in-flight targets, sorted by name
    pub active: Vec<(String, String)>,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Completed share of all pages, `0.0..=100.0`.
    pub fn percent(&self) -> f64 {
        if self.total_pages == 0 {
            return 100.0;
        }
        self.completed_pages as f64 * 100.0 / self.total_pages as f64
    }

    /// Remaining time extrapolated from the average time per page so far.
    pub fn eta(&self) -> Option<Duration> {
        if self.completed_pages == 0 {
            return None;
        }
        let remaining = self.total_pages.saturating_sub(self.completed_pages);
        let per_page = self.elapsed.as_secs_f64() / self.completed_pages as f64;
        Some(Duration::from_secs_f64(per_page * remaining as f64))
    }

    /// Wall-clock time at which the run is expected to finish.
    pub fn finish_at(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        let eta = TimeDelta::from_std(self.eta()?).ok()?;
        now.checked_add_signed(eta)
    }

    /// Single console line: bar, percentage, counts, expected finish time,
    /// elapsed and up to three active targets.
    pub fn status_line(&self) -> String {
        self.status_line_at(Local::now())
    }

    fn status_line_at(&self, now: DateTime<Local>) -> String {
        let filled = ((self.percent() / 100.0) * BAR_WIDTH as f64).round() as usize;
        let filled = filled.min(BAR_WIDTH);
        let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));

        let eta = self
            .finish_at(now)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());

        let mut line = format!(
            "[{}] {:.1}% ({}/{} targets) ETA: {} Elapsed: {}",
            bar,
            self.percent(),
            self.completed_targets,
            self.total_targets,
            eta,
            format_elapsed(self.elapsed.as_secs())
        );

        if !self.active.is_empty() {
            let shown: Vec<String> = self
                .active
                .iter()
                .take(MAX_ACTIVE_SHOWN)
                .map(|(name, status)| format!("{}: {}", name, status))
                .collect();
            line.push_str(" | ");
            line.push_str(&shown.join(", "));
            if self.active.len() > MAX_ACTIVE_SHOWN {
                line.push_str(&format!(" +{}", self.active.len() - MAX_ACTIVE_SHOWN));
            }
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_counts_and_eta() {
        let tracker = ProgressTracker::new(2, 4);
        assert_eq!(tracker.snapshot().eta(), None);

        tracker.set_status("Zulrah", "scraping page 1");
        tokio::time::advance(Duration::from_secs(10)).await;
        tracker.complete_pages(2);

        let snap = tracker.snapshot();
        assert_eq!(snap.total_pages, 8);
        assert_eq!(snap.completed_pages, 2);
        assert_eq!(snap.percent(), 25.0);
        assert_eq!(snap.eta(), Some(Duration::from_secs(30)));
        assert_eq!(
            snap.active,
            vec![("Zulrah".to_string(), "scraping page 1".to_string())]
        );
    }

    #[test]
    fn test_complete_target_drops_status() {
        let tracker = ProgressTracker::new(3, 2);
        tracker.set_status("Obor", "saving");
        tracker.set_status("Bryophyta", "scraping page 2");
        tracker.complete_target("Obor");

        let snap = tracker.snapshot();
        assert_eq!(snap.completed_targets, 1);
        assert_eq!(snap.active.len(), 1);
        assert_eq!(snap.active[0].0, "Bryophyta");
    }

    #[test]
    fn test_counters_are_capped() {
        let tracker = ProgressTracker::new(1, 2);
        tracker.complete_pages(5);
        tracker.complete_target("a");
        tracker.complete_target("a");
        let snap = tracker.snapshot();
        assert_eq!(snap.completed_pages, 2);
        assert_eq!(snap.completed_targets, 1);
        assert_eq!(snap.percent(), 100.0);
    }

    #[test]
    fn test_status_line_shows_three_active() {
        let tracker = ProgressTracker::new(10, 1);
        for name in ["A", "B", "C", "D"] {
            tracker.set_status(name, "scraping page 1");
        }
        let line = tracker.snapshot().status_line();
        assert!(line.contains("(0/10 targets)"));
        assert!(line.contains("ETA: --:--:--"));
        assert!(line.contains("A: scraping page 1, B: scraping page 1, C: scraping page 1 +1"));
        assert!(!line.contains("D:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_line_shows_finish_clock_time() {
        let tracker = ProgressTracker::new(1, 4);
        tokio::time::advance(Duration::from_secs(20)).await;
        tracker.complete_pages(1);
        let snap = tracker.snapshot();

        let now = Local::now();
        let expected = now + TimeDelta::seconds(60);
        assert_eq!(snap.finish_at(now), Some(expected));
        let line = snap.status_line_at(now);
        assert!(line.contains(&format!("ETA: {}", expected.format("%H:%M:%S"))));
        assert!(line.contains("Elapsed: 0:00:20"));
    }

    #[test]
    fn test_empty_run_is_complete() {
        let tracker = ProgressTracker::new(0, 8);
        let snap = tracker.snapshot();
        assert_eq!(snap.percent(), 100.0);
        assert!(snap.status_line().starts_with(&format!("[{}]", "█".repeat(BAR_WIDTH))));
    }
}
