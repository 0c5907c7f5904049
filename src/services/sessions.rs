// src/services/sessions.rs

//! Per-slot HTTP sessions.
//!
//! Each worker slot reuses one `reqwest::Client` (and its connection pool)
//! until the session grows too old or sits idle too long.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Result;
use crate::models::ScraperConfig;
use crate::utils::pause;

/// First wait of the transport-level retry, doubled per attempt.
const TRANSIENT_BACKOFF: Duration = Duration::from_millis(500);

/// Statuses retried inside a session before the fetcher sees them.
///
/// 429 and 503 are left to the fetcher, which waits them out and sends
/// every new attempt through the rate limiter.
const TRANSIENT_STATUSES: [StatusCode; 3] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Session construction and expiry settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub idle_timeout: Duration,
    pub request_timeout: Duration,
    pub pool_size: usize,
    pub transient_retries: u32,
}

impl From<&ScraperConfig> for SessionSettings {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            ttl: config.session_ttl(),
            idle_timeout: config.session_idle(),
            request_timeout: config.request_timeout(),
            pool_size: config.session_pool_size,
            transient_retries: config.transient_retries,
        }
    }
}

/// Reusable connection context bound to one worker slot.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    created_at: Instant,
    last_used: Instant,
    transient_retries: u32,
}

impl Session {
    fn open(settings: &SessionSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .pool_max_idle_per_host(settings.pool_size)
            .pool_idle_timeout(settings.idle_timeout)
            .build()?;
        let now = Instant::now();
        Ok(Self {
            client,
            created_at: now,
            last_used: now,
            transient_retries: settings.transient_retries,
        })
    }

    fn is_fresh(&self, settings: &SessionSettings, now: Instant) -> bool {
        now.duration_since(self.created_at) < settings.ttl
            && now.duration_since(self.last_used) < settings.idle_timeout
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Send a GET, retrying transient server errors a few times.
    ///
    /// A response carrying `Retry-After` is never resent here. The outer
    /// result only fails on cancellation. The inner result is the transport
    /// outcome; a response that is still transient after the retries is
    /// returned as-is for the caller to classify.
    pub async fn get(
        &self,
        url: &Url,
        headers: HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Result<Response>> {
        let mut attempt = 0;
        loop {
            let sent = self
                .client
                .get(url.clone())
                .headers(headers.clone())
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) => return Ok(Err(e)),
            };
            if attempt >= self.transient_retries
                || !TRANSIENT_STATUSES.contains(&response.status())
                || response.headers().contains_key(RETRY_AFTER)
            {
                return Ok(Ok(response));
            }

            let wait = TRANSIENT_BACKOFF * 2u32.saturating_pow(attempt);
            log::debug!(
                "Transient {} from {}, session retry {} in {:?}",
                response.status(),
                url,
                attempt + 1,
                wait
            );
            drop(response);
            pause(wait, cancel).await?;
            attempt += 1;
        }
    }
}

/// Session per worker slot, replaced when stale.
#[derive(Debug)]
pub struct SessionCache {
    settings: SessionSettings,
    sessions: Mutex<HashMap<usize, Session>>,
}

impl SessionCache {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Session for `slot`, opening a new one if the cached one is stale.
    /// Marks the session as used.
    pub fn acquire(&self, slot: usize) -> Result<Session> {
        let now = Instant::now();
        let mut sessions = self.lock();

        if let Some(session) = sessions.get_mut(&slot) {
            if session.is_fresh(&self.settings, now) {
                session.last_used = now;
                return Ok(session.clone());
            }
            log::debug!("Session for worker {} expired, reopening", slot);
        }

        let session = Session::open(&self.settings)?;
        sessions.insert(slot, session.clone());
        Ok(session)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
