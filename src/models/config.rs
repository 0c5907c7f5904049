//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::secs;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Concurrency, pacing and pagination settings
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Per-page retry state machine settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Input and output locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Console and log settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scraper;
        if s.worker_count == 0 {
            return Err(AppError::validation("scraper.worker_count must be > 0"));
        }
        if s.max_pages_per_target == 0 {
            return Err(AppError::validation(
                "scraper.max_pages_per_target must be > 0",
            ));
        }
        if s.max_requests_per_minute == 0 {
            return Err(AppError::validation(
                "scraper.max_requests_per_minute must be > 0",
            ));
        }
        if s.request_timeout == 0 {
            return Err(AppError::validation("scraper.request_timeout must be > 0"));
        }
        if s.full_page_threshold == 0 {
            return Err(AppError::validation(
                "scraper.full_page_threshold must be > 0",
            ));
        }
        if s.session_pool_size == 0 {
            return Err(AppError::validation(
                "scraper.session_pool_size must be > 0",
            ));
        }
        check_range("scraper.min_delay/max_delay", s.min_delay, s.max_delay)?;
        check_range(
            "scraper.page_retry_min/page_retry_max",
            s.page_retry_min,
            s.page_retry_max,
        )?;
        check_range(
            "scraper.page_pause_min/page_pause_max",
            s.page_pause_min,
            s.page_pause_max,
        )?;
        check_non_negative("scraper.inter_batch_delay", s.inter_batch_delay)?;

        let r = &self.retry;
        if r.max_retries == 0 {
            return Err(AppError::validation("retry.max_retries must be > 0"));
        }
        if !(r.backoff_factor >= 1.0) {
            return Err(AppError::validation("retry.backoff_factor must be >= 1"));
        }
        for (name, value) in [
            ("retry.base_delay", r.base_delay),
            ("retry.max_backoff", r.max_backoff),
            ("retry.rate_limited_default", r.rate_limited_default),
            ("retry.blocked_wait", r.blocked_wait),
            ("retry.no_table_wait", r.no_table_wait),
            ("retry.no_rows_wait", r.no_rows_wait),
        ] {
            check_non_negative(name, value)?;
        }
        Ok(())
    }
}

/// Longest wait any delay setting may ask for (one day).
const MAX_WAIT_SECS: f64 = 86_400.0;

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(AppError::validation(format!("{name} must be >= 0")));
    }
    if value > MAX_WAIT_SECS {
        return Err(AppError::validation(format!(
            "{name} must be <= {MAX_WAIT_SECS} seconds"
        )));
    }
    Ok(())
}

fn check_range(name: &str, min: f64, max: f64) -> Result<()> {
    check_non_negative(name, min)?;
    check_non_negative(name, max)?;
    if min > max {
        return Err(AppError::validation(format!("{name}: min exceeds max")));
    }
    Ok(())
}

/// Worker pool, pacing and pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Number of concurrent worker slots
    #[serde(default = "defaults::worker_count")]
    pub worker_count: usize,

    /// Upper bound on pages fetched per target
    #[serde(default = "defaults::max_pages")]
    pub max_pages_per_target: u32,

    /// Politeness jitter before each request, in seconds
    #[serde(default = "defaults::min_delay")]
    pub min_delay: f64,
    #[serde(default = "defaults::max_delay")]
    pub max_delay: f64,

    /// Extra pause after every `pace_every` completed targets, in seconds
    #[serde(default = "defaults::inter_batch_delay")]
    pub inter_batch_delay: f64,
    #[serde(default = "defaults::pace_every")]
    pub pace_every: usize,

    /// Request timeout in seconds
    #[serde(default = "defaults::request_timeout")]
    pub request_timeout: u64,

    /// Global admissions allowed per trailing minute
    #[serde(default = "defaults::max_requests_per_minute")]
    pub max_requests_per_minute: usize,

    /// Session lifetime limits in seconds
    #[serde(default = "defaults::session_ttl")]
    pub session_ttl_seconds: u64,
    #[serde(default = "defaults::session_idle")]
    pub session_idle_seconds: u64,

    /// Idle connections kept per host by each session
    #[serde(default = "defaults::session_pool_size")]
    pub session_pool_size: usize,

    /// Transport-level retries for 429/500/502/503/504 inside a session
    #[serde(default = "defaults::transient_retries")]
    pub transient_retries: u32,

    /// A page with fewer rows than this ends pagination
    #[serde(default = "defaults::full_page_threshold")]
    pub full_page_threshold: usize,

    /// Wait before re-fetching a page that produced no data, in seconds
    #[serde(default = "defaults::page_retry_min")]
    pub page_retry_min: f64,
    #[serde(default = "defaults::page_retry_max")]
    pub page_retry_max: f64,

    /// Pause between consecutive full pages, in seconds
    #[serde(default = "defaults::page_pause_min")]
    pub page_pause_min: f64,
    #[serde(default = "defaults::page_pause_max")]
    pub page_pause_max: f64,
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_seconds)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        secs(self.inter_batch_delay)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            worker_count: defaults::worker_count(),
            max_pages_per_target: defaults::max_pages(),
            min_delay: defaults::min_delay(),
            max_delay: defaults::max_delay(),
            inter_batch_delay: defaults::inter_batch_delay(),
            pace_every: defaults::pace_every(),
            request_timeout: defaults::request_timeout(),
            max_requests_per_minute: defaults::max_requests_per_minute(),
            session_ttl_seconds: defaults::session_ttl(),
            session_idle_seconds: defaults::session_idle(),
            session_pool_size: defaults::session_pool_size(),
            transient_retries: defaults::transient_retries(),
            full_page_threshold: defaults::full_page_threshold(),
            page_retry_min: defaults::page_retry_min(),
            page_retry_max: defaults::page_retry_max(),
            page_pause_min: defaults::page_pause_min(),
            page_pause_max: defaults::page_pause_max(),
        }
    }
}

/// Waits and limits applied by the page fetcher. Durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per page before giving up with an empty result
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Initial network backoff, grown by `backoff_factor` up to `max_backoff`
    #[serde(default = "defaults::base_delay")]
    pub base_delay: f64,
    #[serde(default = "defaults::backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "defaults::max_backoff")]
    pub max_backoff: f64,

    /// Wait after a 429 without a usable Retry-After header
    #[serde(default = "defaults::rate_limited_default")]
    pub rate_limited_default: f64,

    /// Wait after a 403/503 block
    #[serde(default = "defaults::blocked_wait")]
    pub blocked_wait: f64,

    /// Wait when the page has no table
    #[serde(default = "defaults::no_table_wait")]
    pub no_table_wait: f64,

    /// Wait when the table has no data rows
    #[serde(default = "defaults::no_rows_wait")]
    pub no_rows_wait: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            base_delay: defaults::base_delay(),
            backoff_factor: defaults::backoff_factor(),
            max_backoff: defaults::max_backoff(),
            rate_limited_default: defaults::rate_limited_default(),
            blocked_wait: defaults::blocked_wait(),
            no_table_wait: defaults::no_table_wait(),
            no_rows_wait: defaults::no_rows_wait(),
        }
    }
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// CSV with `Boss_Name,URL` columns
    #[serde(default = "defaults::targets_file")]
    pub targets_file: String,

    /// CSV with header profile columns
    #[serde(default = "defaults::headers_file")]
    pub headers_file: String,

    /// Directory receiving one summary CSV per target
    #[serde(default = "defaults::output_dir")]
    pub output_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            targets_file: defaults::targets_file(),
            headers_file: defaults::headers_file(),
            output_dir: defaults::output_dir(),
        }
    }
}

/// Console and log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Render the live progress line
    #[serde(default = "defaults::show_progress")]
    pub show_progress: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            show_progress: defaults::show_progress(),
        }
    }
}

mod defaults {
    // Scraper defaults
    pub fn worker_count() -> usize {
        1
    }
    pub fn max_pages() -> u32 {
        8
    }
    pub fn min_delay() -> f64 {
        0.5
    }
    pub fn max_delay() -> f64 {
        1.0
    }
    pub fn inter_batch_delay() -> f64 {
        0.5
    }
    pub fn pace_every() -> usize {
        5
    }
    pub fn request_timeout() -> u64 {
        60
    }
    pub fn max_requests_per_minute() -> usize {
        25
    }
    pub fn session_ttl() -> u64 {
        300
    }
    pub fn session_idle() -> u64 {
        60
    }
    pub fn session_pool_size() -> usize {
        4
    }
    pub fn transient_retries() -> u32 {
        2
    }
    pub fn full_page_threshold() -> usize {
        25
    }
    pub fn page_retry_min() -> f64 {
        0.5
    }
    pub fn page_retry_max() -> f64 {
        2.0
    }
    pub fn page_pause_min() -> f64 {
        3.0
    }
    pub fn page_pause_max() -> f64 {
        7.0
    }

    // Retry defaults
    pub fn max_retries() -> u32 {
        100
    }
    pub fn base_delay() -> f64 {
        1.0
    }
    pub fn backoff_factor() -> f64 {
        1.5
    }
    pub fn max_backoff() -> f64 {
        300.0
    }
    pub fn rate_limited_default() -> f64 {
        60.0
    }
    pub fn blocked_wait() -> f64 {
        300.0
    }
    pub fn no_table_wait() -> f64 {
        60.0
    }
    pub fn no_rows_wait() -> f64 {
        30.0
    }

    // Path defaults
    pub fn targets_file() -> String {
        "data/targets.csv".into()
    }
    pub fn headers_file() -> String {
        "data/headers.csv".into()
    }
    pub fn output_dir() -> String {
        "output".into()
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
    pub fn show_progress() -> bool {
        true
    }
}
