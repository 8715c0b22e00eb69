// src/services/throttle.rs

//! Request pacing between fetches to the same host.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::utils::get_domain;

/// Throttle collaborator, awaited before every fetch the orchestrator issues.
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn wait(&self, url: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Throttle for NoDelay {
    async fn wait(&self, _url: &str) {}
}

/// Enforces a minimum interval between requests to one host.
///
/// The lock is held while sleeping, so concurrent callers for a host queue
/// up and leave one interval apart.
pub struct FixedDelay {
    interval: Duration,
    last: Mutex<HashMap<String, Instant>>,
}

impl FixedDelay {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

#[async_trait]
impl Throttle for FixedDelay {
    async fn wait(&self, url: &str) {
        if self.interval.is_zero() {
            return;
        }
        let host = get_domain(url).unwrap_or_default();
        let mut last = self.last.lock().await;
        if let Some(previous) = last.get(&host) {
            let ready_at = *previous + self.interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        last.insert(host, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_spaces_same_host() {
        let throttle = FixedDelay::from_millis(500);
        let start = Instant::now();

        throttle.wait("https://a.test/1").await;
        assert!(start.elapsed() < Duration::from_millis(10));

        throttle.wait("https://a.test/2").await;
        assert!(start.elapsed() >= Duration::from_millis(500));

        // Different host is not delayed by a.test
        let before = Instant::now();
        throttle.wait("https://b.test/1").await;
        assert!(before.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_no_delay() {
        let start = Instant::now();
        for _ in 0..10 {
            NoDelay.wait("https://a.test/").await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
