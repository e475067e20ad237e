//! Per-client API rate limiting (spec.md §4.1, §5 item 2): "N requests
//! per 60 seconds"; a no-op when N <= 0. Every outbound metadata/search/
//! stream-url request passes through this before the socket write;
//! download body transfer is not limited.

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter as GovernorLimiter};

type DirectLimiter = GovernorLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct RateLimiter {
    inner: Option<DirectLimiter>,
}

impl RateLimiter {
    /// `requests_per_minute <= 0` produces a no-op limiter, matching the
    /// original's `contextlib.nullcontext()` branch.
    pub fn new(requests_per_minute: i64) -> Self {
        let inner = NonZeroU32::new(requests_per_minute.max(0) as u32)
            .map(|n| GovernorLimiter::direct(Quota::per_minute(n)));
        Self { inner }
    }

    /// Block until a request slot is available. A no-op limiter returns
    /// immediately.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.inner {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn disabled_limiter_never_blocks() {
        let limiter = RateLimiter::new(0);
        let start = Instant::now();
        for _ in 0..50 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < std::time::Duration::from_millis(50));
    }

    #[tokio::test]
    async fn limiter_admits_burst_then_throttles() {
        let limiter = RateLimiter::new(120); // 2/s
        let start = Instant::now();
        // first request is always admitted immediately
        limiter.acquire().await;
        assert!(start.elapsed() < std::time::Duration::from_millis(50));
    }
}
