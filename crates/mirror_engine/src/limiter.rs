use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio_util::sync::CancellationToken;

use crate::{FailureKind, FetchError};

/// Token bucket pacing outbound requests: one grant per `interval`, burst 1.
///
/// Shared by every fetch task of a mirror run. A zero interval disables
/// pacing.
pub struct RequestLimiter {
    limiter: Option<DefaultDirectRateLimiter>,
    interval: Duration,
}

impl RequestLimiter {
    pub fn new(interval: Duration) -> Self {
        let limiter = Quota::with_period(interval)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));
        Self { limiter, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Suspend the calling task until a token is granted.
    ///
    /// Fails only when `cancel` fires first; the caller must then abandon
    /// the fetch.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), FetchError> {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(cancelled()),
            _ = limiter.until_ready() => Ok(()),
        }
    }
}

fn cancelled() -> FetchError {
    FetchError::new(FailureKind::Cancelled, "rate limiter wait cancelled")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn grants_are_spaced_by_interval() {
        let limiter = RequestLimiter::new(Duration::from_millis(250));
        let cancel = CancellationToken::new();

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire(&cancel).await.unwrap();
        }
        // three grants need two full intervals
        assert!(start.elapsed() >= Duration::from_millis(480));
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let limiter = RequestLimiter::new(Duration::ZERO);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire(&cancel).await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn cancelled_token_fails_acquire() {
        let limiter = RequestLimiter::new(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        cancel.cancel();
        let err = limiter.acquire(&cancel).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Cancelled);
    }
}
