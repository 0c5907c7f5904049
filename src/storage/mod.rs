//! Persistence of per-target summaries and the run report.
//!
//! ## Directory Structure
//!
//! ```text
//! {output_dir}/
//! ├── Zulrah.csv            # one summary row per completed target
//! ├── Corporeal_Beast.csv
//! └── run.json              # report of the latest run
//! ```

pub mod local;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{RunReport, TargetSummary};

pub use local::LocalStorage;

/// Column header of every summary file.
pub const SUMMARY_HEADER: [&str; 4] = ["Boss Name", "Total KC", "Players", "Last Updated"];

/// Key of the run report.
pub const REPORT_KEY: &str = "run.json";

/// Trait for summary storage backends.
#[async_trait]
pub trait SummaryStorage: Send + Sync {
    /// Persist one target's summary, replacing any previous one.
    /// Returns where it was written.
    async fn write_summary(&self, summary: &TargetSummary) -> Result<PathBuf>;

    /// Persist the report of a finished (or interrupted) run.
    async fn write_report(&self, report: &RunReport) -> Result<()>;

    /// Load the latest run report, if any.
    async fn load_report(&self) -> Result<Option<RunReport>>;
}
