//! Token-bucket rate limiter
//!
//! Bounds calls per second to the exchange adapter. `acquire` never rejects;
//! it waits until a token is available. Refill is measured on the tokio
//! clock, so a paused test runtime drives it without real waiting.

use log::debug;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Slowest rate a limiter runs at, one call every 1000 seconds
pub const MIN_CALLS_PER_SECOND: f64 = 0.001;

/// Token accounting, mutated only under the limiter's lock
#[derive(Debug)]
struct RateBudget {
    /// Tokens added per second
    rate: f64,
    /// Most tokens the bucket holds (one second's worth, at least one)
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl RateBudget {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Take a token, or report how long until one is available
    fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let wait = (1.0 - self.tokens) / self.rate;
            Err(Duration::try_from_secs_f64(wait).unwrap_or(Duration::MAX))
        }
    }
}

/// Limits calls per second, shared by all callers of one gateway
#[derive(Debug)]
pub struct RateLimiter {
    budget: Mutex<RateBudget>,
}

impl RateLimiter {
    /// Create a limiter allowing `calls_per_second` calls
    ///
    /// The bucket starts with a single token: the first call goes through at
    /// once and later calls are spaced at the configured rate. A rate that is
    /// not a positive number falls back to one call per second; a positive
    /// rate below [`MIN_CALLS_PER_SECOND`] is raised to it.
    pub fn new(calls_per_second: f64) -> Self {
        let rate = if calls_per_second.is_finite() && calls_per_second > 0.0 {
            calls_per_second.max(MIN_CALLS_PER_SECOND)
        } else {
            1.0
        };
        Self {
            budget: Mutex::new(RateBudget {
                rate,
                capacity: rate.max(1.0),
                tokens: 1.0,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Configured calls per second
    pub fn rate(&self) -> f64 {
        self.lock().rate
    }

    /// Wait for a token and consume it
    pub async fn acquire(&self) {
        loop {
            let outcome = self.lock().try_take(Instant::now());
            match outcome {
                Ok(()) => return,
                Err(wait) => {
                    debug!("Rate limit reached, waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateBudget> {
        // The budget stays consistent even if a holder panicked.
        self.budget.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let limiter = RateLimiter::new(1.0);
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_at_rate() {
        let limiter = RateLimiter::new(2.0);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // First is free, the other four wait 0.5s each.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1990), "elapsed {:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(2100), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_refills_up_to_capacity() {
        let limiter = RateLimiter::new(3.0);
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        // Three stored tokens go out at once, the fourth waits a third of a second.
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(330));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_all_get_through() {
        let limiter = Arc::new(RateLimiter::new(10.0));
        let start = Instant::now();
        let handles: Vec<_> = (0..11)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(990));
    }

    #[test]
    fn test_invalid_rate_falls_back() {
        assert_eq!(RateLimiter::new(0.0).rate(), 1.0);
        assert_eq!(RateLimiter::new(f64::NAN).rate(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiny_rate_is_raised_to_minimum() {
        let limiter = RateLimiter::new(1e-20);
        assert_eq!(limiter.rate(), MIN_CALLS_PER_SECOND);

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(999));
    }

    #[test]
    fn test_wait_is_clamped_when_unrepresentable() {
        let mut budget = RateBudget {
            rate: f64::MIN_POSITIVE,
            capacity: 1.0,
            tokens: 0.0,
            last_refill: Instant::now(),
        };
        assert_eq!(budget.try_take(budget.last_refill), Err(Duration::MAX));
    }
}
