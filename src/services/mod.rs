//! Scraping core.
//!
//! - `HeaderPool`: sticky per-slot header profiles with rotation
//! - `RateLimiter`: process-wide sliding-window admission
//! - `SessionCache`: per-slot HTTP sessions with expiry
//! - `PageFetcher`: one page, with classification and retries
//! - `TargetWorker`: one target, page by page

mod fetcher;
mod header_pool;
mod rate_limiter;
mod sessions;
mod table;
mod worker;

pub use fetcher::{
    AttemptFailure, Backoff, FetchSettings, PageFetcher, PageSource, RetryPlan, plan_retry,
};
pub use header_pool::HeaderPool;
pub use rate_limiter::{RateLimiter, WINDOW};
pub use sessions::{Session, SessionCache, SessionSettings};
pub use table::{TableError, TableParser};
pub use worker::{TargetWorker, WorkerSettings};
