//! Pipeline entry points.
//!
//! - `run_scraper`: scrape every target and persist per-target summaries
//! - `run_validate`: check configuration and inputs offline

mod progress;
mod scheduler;
pub mod scrape;
pub mod validate;

pub use progress::{ProgressSnapshot, ProgressTracker};
pub use scheduler::{ScheduleOutcome, Scheduler, SchedulerSettings, TargetSink};
pub use scrape::{Persister, run_scraper};
pub use validate::run_validate;
