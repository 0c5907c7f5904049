// src/services/rate_limiter.rs

//! Process-wide request rate limiter.
//!
//! Bounds the number of admissions in any trailing 60-second window across
//! every worker. Callers queue on a single mutex, which also gives roughly
//! FIFO admission order.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

/// Length of the sliding window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window limiter shared by all workers.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    /// Admission times inside the trailing window, oldest first
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Limiter allowing `max_requests_per_minute` admissions per minute.
    pub fn new(max_requests_per_minute: usize) -> Self {
        Self::with_window(max_requests_per_minute, WINDOW)
    }

    /// Limiter over a custom window length.
    pub fn with_window(max_per_window: usize, window: Duration) -> Self {
        Self {
            max_per_window: max_per_window.max(1),
            window,
            admitted: Mutex::new(VecDeque::with_capacity(max_per_window.max(1))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_per_window
    }

    /// Wait until a request may be sent, then record it.
    ///
    /// The lock is held while waiting, so the window is re-checked by the
    /// same caller after it wakes and no one else can slip in.
    pub async fn admit(&self, cancel: &CancellationToken) -> Result<()> {
        let mut admitted = self.admitted.lock().await;
        loop {
            let now = Instant::now();
            while admitted
                .front()
                .is_some_and(|&t| now.duration_since(t) >= self.window)
            {
                admitted.pop_front();
            }

            if admitted.len() < self.max_per_window {
                admitted.push_back(now);
                return Ok(());
            }

            let Some(&oldest) = admitted.front() else {
                continue;
            };
            let wake_at = oldest + self.window;
            log::debug!(
                "Rate limit reached ({} per {:?}), waiting {:.1}s",
                self.max_per_window,
                self.window,
                wake_at.saturating_duration_since(now).as_secs_f64()
            );
            tokio::select! {
                _ = tokio::time::sleep_until(wake_at) => {}
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
            }
        }
    }

    /// Admissions currently inside the window.
    pub async fn in_window(&self) -> usize {
        let now = Instant::now();
        self.admitted
            .lock()
            .await
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn assert_window_bound(times: &[Instant], limit: usize, window: Duration) {
        for (i, &start) in times.iter().enumerate() {
            let inside = times[i..]
                .iter()
                .take_while(|&&t| t.duration_since(start) < window)
                .count();
            assert!(
                inside <= limit,
                "{inside} admissions within {window:?} starting at #{i}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_capacity_immediately() {
        let limiter = RateLimiter::new(5);
        let token = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.admit(&token).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.in_window().await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_oldest_to_age_out() {
        let limiter = RateLimiter::new(2);
        let token = CancellationToken::new();
        let start = Instant::now();
        limiter.admit(&token).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.admit(&token).await.unwrap();

        limiter.admit(&token).await.unwrap();
        let waited = start.elapsed();
        assert!(waited >= WINDOW && waited < WINDOW + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_bound_sequential() {
        let limiter = RateLimiter::new(3);
        let token = CancellationToken::new();
        let mut times = Vec::new();
        for i in 0..12 {
            limiter.admit(&token).await.unwrap();
            times.push(Instant::now());
            tokio::time::advance(Duration::from_secs(i % 4)).await;
        }
        assert_window_bound(&times, 3, WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_bound_concurrent() {
        let limiter = Arc::new(RateLimiter::new(4));
        let token = CancellationToken::new();
        let times = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            let times = Arc::clone(&times);
            handles.push(tokio::spawn(async move {
                for _ in 0..5 {
                    limiter.admit(&token).await.unwrap();
                    times.lock().unwrap().push(Instant::now());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut times = times.lock().unwrap().clone();
        times.sort();
        assert_eq!(times.len(), 20);
        assert_window_bound(&times, 4, WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting() {
        let limiter = RateLimiter::new(1);
        let token = CancellationToken::new();
        limiter.admit(&token).await.unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });
        let result = limiter.admit(&token).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }
}
