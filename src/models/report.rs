//! Run-level statistics written next to the per-target summaries.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// What happened during one scraper run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub total_targets: usize,
    pub completed_pages: usize,
    /// Targets whose summary was persisted
    pub successful: Vec<String>,
    /// Targets that produced no rows, failed to persist, or crashed
    pub failed: Vec<String>,
    pub interrupted: bool,
}

impl RunReport {
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Average wall time per successful target, or zero if none succeeded.
    pub fn average_secs_per_target(&self) -> f64 {
        if self.successful.is_empty() {
            0.0
        } else {
            self.elapsed_secs() / self.successful.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_average_time() {
        let started_at = Local::now();
        let report = RunReport {
            started_at,
            finished_at: started_at + Duration::seconds(90),
            total_targets: 4,
            completed_pages: 12,
            successful: vec!["a".into(), "b".into(), "c".into()],
            failed: vec!["d".into()],
            interrupted: false,
        };
        assert_eq!(report.elapsed_secs(), 90.0);
        assert_eq!(report.average_secs_per_target(), 30.0);
    }

    #[test]
    fn test_average_time_without_successes() {
        let now = Local::now();
        let report = RunReport {
            started_at: now,
            finished_at: now,
            total_targets: 1,
            completed_pages: 0,
            successful: vec![],
            failed: vec!["x".into()],
            interrupted: true,
        };
        assert_eq!(report.average_secs_per_target(), 0.0);
    }
}
