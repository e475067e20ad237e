//! The process-wide download concurrency cap (spec.md §5, item 1).
//!
//! A thin wrapper over `tokio::sync::Semaphore` rather than the bare
//! primitive so call sites read like the original's
//! `async with global_download_semaphore(...)`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, SemaphorePermit};

pub struct DownloadSemaphore {
    inner: Semaphore,
    delay: Duration,
}

impl DownloadSemaphore {
    /// `max_connections` is clamped to at least 1 (spec.md §5: "clamp to >= 1").
    /// `delay` is the optional artificial per-acquisition delay driven by
    /// `requests_per_minute`-style throttling; pass `Duration::ZERO` to disable.
    pub fn new(max_connections: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: Semaphore::new(max_connections.max(1)),
            delay,
        })
    }

    /// Acquire one of the `max_connections` download slots, applying the
    /// configured artificial delay after acquisition and before the
    /// caller enters the body-transfer region.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        let permit = self
            .inner
            .acquire()
            .await
            .expect("download semaphore is never closed");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        permit
    }

    #[cfg(test)]
    pub fn available_permits(&self) -> usize {
        self.inner.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn caps_concurrent_holders() {
        let sem = DownloadSemaphore::new(2, Duration::ZERO);
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let sem = sem.clone();
            let concurrent = concurrent.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn clamps_zero_to_one() {
        let sem = DownloadSemaphore::new(0, Duration::ZERO);
        assert_eq!(sem.available_permits(), 1);
    }
}
