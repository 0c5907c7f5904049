// src/utils/pause.rs

//! Cancellable sleeps and random pacing.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

/// Sleep for `duration` unless `cancel` fires first.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(AppError::Cancelled),
    }
}

/// Uniform random duration in `[min_secs, max_secs]`.
pub fn jitter(min_secs: f64, max_secs: f64) -> Duration {
    let secs = if max_secs > min_secs {
        rand::rng().random_range(min_secs..=max_secs)
    } else {
        min_secs
    };
    self::secs(secs)
}

/// Seconds as a `Duration`, clamping negatives and NaN to zero and
/// saturating values too large to represent.
pub fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..200 {
            let d = jitter(3.0, 7.0);
            assert!(d >= Duration::from_secs(3) && d <= Duration::from_secs(7));
        }
        assert_eq!(jitter(1.5, 1.5), Duration::from_millis(1500));
        assert_eq!(jitter(0.0, 0.0), Duration::ZERO);
    }

    #[test]
    fn test_secs_clamps() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(2.5), Duration::from_millis(2500));
        assert_eq!(secs(1e20), Duration::MAX);
        assert_eq!(secs(f64::INFINITY), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_sleeps() {
        let token = CancellationToken::new();
        let start = tokio::time::Instant::now();
        pause(Duration::from_secs(30), &token).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_cancelled() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            child.cancel();
        });
        let start = tokio::time::Instant::now();
        let result = pause(Duration::from_secs(300), &token).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(300));
    }
}
