// src/services/fetcher.rs

//! Single-page fetcher and its retry state machine.
//!
//! Every attempt goes through the global rate limiter and a politeness
//! jitter, then issues one GET with the slot's session and header profile.
//! Failed attempts are classified, waited out and retried until the page
//! yields rows or the attempt budget is spent. The fetcher never reports a
//! failure to its caller: an exhausted page simply comes back empty.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Result;
use crate::models::{RetryConfig, Row, ScraperConfig, Target};
use crate::services::table::{TableError, TableParser};
use crate::services::{HeaderPool, RateLimiter, SessionCache};
use crate::utils::url::request_url;
use crate::utils::{jitter, pause, secs};

/// Source of leaderboard pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Rows of `page` for `target`, fetched on behalf of worker `slot`.
    ///
    /// An empty vector means no data could be obtained. The only error is
    /// cancellation.
    async fn fetch(
        &self,
        target: &Target,
        page: u32,
        slot: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>>;
}

/// Classified outcome of a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// 429, with the server's Retry-After if it sent a usable one
    RateLimited { retry_after: Option<Duration> },
    /// 403 or 503, treated as an IP-level block
    Blocked(StatusCode),
    /// Any other non-success status
    Status(StatusCode),
    /// No table in the document
    NoTable,
    /// A table without data rows
    NoRows,
    Timeout,
    Network(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited { .. } => write!(f, "rate limited"),
            Self::Blocked(status) => write!(f, "blocked ({})", status.as_u16()),
            Self::Status(status) => write!(f, "HTTP {}", status.as_u16()),
            Self::NoTable => write!(f, "no table found"),
            Self::NoRows => write!(f, "no player data in table"),
            Self::Timeout => write!(f, "timeout"),
            Self::Network(message) => write!(f, "request error: {}", message),
        }
    }
}

impl From<TableError> for AttemptFailure {
    fn from(err: TableError) -> Self {
        match err {
            TableError::NoTable => Self::NoTable,
            TableError::NoRows => Self::NoRows,
        }
    }
}

impl AttemptFailure {
    fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }

    fn from_response(response: &Response) -> Option<Self> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            Some(Self::RateLimited {
                retry_after: parse_retry_after(response),
            })
        } else if status == StatusCode::FORBIDDEN || status == StatusCode::SERVICE_UNAVAILABLE {
            Some(Self::Blocked(status))
        } else if !status.is_success() {
            Some(Self::Status(status))
        } else {
            None
        }
    }
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Exponential backoff for timeouts and transport errors.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: f64,
    factor: f64,
    ceiling: f64,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            current: config.base_delay.min(config.max_backoff),
            factor: config.backoff_factor.max(1.0),
            ceiling: config.max_backoff,
        }
    }

    /// Delay for this failure; grows the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = secs(self.current);
        self.current = (self.current * self.factor).min(self.ceiling);
        delay
    }
}

/// What to do before the next attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPlan {
    pub wait: Duration,
    pub rotate_headers: bool,
}

/// Map a failure to its wait and header rotation.
pub fn plan_retry(failure: &AttemptFailure, config: &RetryConfig, backoff: &mut Backoff) -> RetryPlan {
    let (wait, rotate_headers) = match failure {
        AttemptFailure::RateLimited { retry_after } => (
            retry_after.unwrap_or_else(|| secs(config.rate_limited_default)),
            true,
        ),
        AttemptFailure::Blocked(_) => (secs(config.blocked_wait), true),
        AttemptFailure::NoTable => (secs(config.no_table_wait), false),
        AttemptFailure::NoRows => (secs(config.no_rows_wait), false),
        AttemptFailure::Timeout => (backoff.next_delay(), false),
        AttemptFailure::Status(_) | AttemptFailure::Network(_) => (backoff.next_delay(), true),
    };
    RetryPlan {
        wait,
        rotate_headers,
    }
}

/// Pacing and retry settings for the fetcher.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub min_delay: f64,
    pub max_delay: f64,
    pub retry: RetryConfig,
}

impl FetchSettings {
    pub fn new(scraper: &ScraperConfig, retry: &RetryConfig) -> Self {
        Self {
            min_delay: scraper.min_delay,
            max_delay: scraper.max_delay,
            retry: retry.clone(),
        }
    }
}

/// Fetches leaderboard pages over HTTP.
pub struct PageFetcher {
    limiter: Arc<RateLimiter>,
    sessions: Arc<SessionCache>,
    headers: Arc<HeaderPool>,
    parser: TableParser,
    settings: FetchSettings,
}

impl PageFetcher {
    pub fn new(
        limiter: Arc<RateLimiter>,
        sessions: Arc<SessionCache>,
        headers: Arc<HeaderPool>,
        settings: FetchSettings,
    ) -> Result<Self> {
        Ok(Self {
            limiter,
            sessions,
            headers,
            parser: TableParser::new()?,
            settings,
        })
    }

    /// One GET of `url` for `slot`. The outer result only fails on
    /// cancellation.
    async fn attempt(
        &self,
        url: &Url,
        slot: usize,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<Vec<Row>, AttemptFailure>> {
        let session = match self.sessions.acquire(slot) {
            Ok(session) => session,
            Err(e) => return Ok(Err(AttemptFailure::Network(e.to_string()))),
        };
        let headers = self.headers.assign(slot).to_header_map();

        let response = match session.get(url, headers, cancel).await? {
            Ok(response) => response,
            Err(e) => return Ok(Err(AttemptFailure::from_transport(&e))),
        };
        if let Some(failure) = AttemptFailure::from_response(&response) {
            return Ok(Err(failure));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Ok(Err(AttemptFailure::from_transport(&e))),
        };
        Ok(self.parser.parse(&body).map_err(AttemptFailure::from))
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch(
        &self,
        target: &Target,
        page: u32,
        slot: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>> {
        let url = match request_url(&target.base_url, page) {
            Ok(url) => url,
            Err(e) => {
                log::error!("Worker {}: cannot build URL for {}: {}", slot, target.name, e);
                return Ok(Vec::new());
            }
        };

        let retry = &self.settings.retry;
        let mut backoff = Backoff::new(retry);

        for attempt in 1..=retry.max_retries {
            self.limiter.admit(cancel).await?;
            pause(jitter(self.settings.min_delay, self.settings.max_delay), cancel).await?;

            let failure = match self.attempt(&url, slot, cancel).await? {
                Ok(rows) => {
                    log::debug!(
                        "Worker {}: {} page {} -> {} rows",
                        slot,
                        target.name,
                        page,
                        rows.len()
                    );
                    return Ok(rows);
                }
                Err(failure) => failure,
            };

            let plan = plan_retry(&failure, retry, &mut backoff);
            log::warn!(
                "Worker {}: {} page {} attempt {}/{}: {}, waiting {:.1}s",
                slot,
                target.name,
                page,
                attempt,
                retry.max_retries,
                failure,
                plan.wait.as_secs_f64()
            );
            pause(plan.wait, cancel).await?;
            if plan.rotate_headers {
                self.headers.rotate(slot);
            }
        }

        log::error!(
            "Worker {}: {} page {}: max retries reached",
            slot,
            target.name,
            page
        );
        Ok(Vec::new())
    }
}
