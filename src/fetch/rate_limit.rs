//! Per-domain rate limiting
//!
//! One `RateLimiter` is shared by every crawl job in the process. This is
//! what keeps the bounded worker pool polite even when two different
//! sources point at the same site: all fetches for a domain serialize
//! through the domain's entry here, regardless of which job issues them.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tracks the last outbound request time per domain and enforces a minimum
/// interval between consecutive requests to the same domain
pub struct RateLimiter {
    last_request: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with no recorded requests
    pub fn new() -> Self {
        Self {
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to `domain` is permitted, then claims the slot
    ///
    /// On return the caller owns the next request slot for the domain: the
    /// timestamp is stamped inside the lock, so two concurrent callers can
    /// never both pass with less than `min_interval` between them.
    ///
    /// # Arguments
    ///
    /// * `domain` - The domain about to be requested
    /// * `min_interval` - Minimum gap since the previous request
    pub async fn acquire(&self, domain: &str, min_interval: Duration) {
        loop {
            let wait = {
                let mut last_request = self.last_request.lock().await;
                let now = Instant::now();

                match last_request.get(domain) {
                    Some(last) => {
                        let elapsed = now.duration_since(*last);
                        if elapsed >= min_interval {
                            last_request.insert(domain.to_string(), now);
                            return;
                        }
                        min_interval - elapsed
                    }
                    None => {
                        last_request.insert(domain.to_string(), now);
                        return;
                    }
                }
            };

            tracing::trace!("Rate limiter: waiting {:?} for domain {}", wait, domain);
            tokio::time::sleep(wait).await;
        }
    }

    /// Returns when the domain was last requested, if ever
    pub async fn last_request_at(&self, domain: &str) -> Option<Instant> {
        self.last_request.lock().await.get(domain).copied()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the effective delay for a domain
///
/// The larger of the robots.txt crawl delay (if any) and the configured
/// default delay wins.
pub fn effective_delay(robots_delay_secs: Option<f64>, default_delay: Duration) -> Duration {
    let robots_delay = robots_delay_secs
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::ZERO);

    std::cmp::max(robots_delay, default_delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_acquire_immediate() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        limiter.acquire("example.com", Duration::from_secs(5)).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_second_acquire_waits() {
        let limiter = RateLimiter::new();
        let interval = Duration::from_millis(100);

        limiter.acquire("example.com", interval).await;
        let start = Instant::now();
        limiter.acquire("example.com", interval).await;

        assert!(start.elapsed() >= interval);
    }

    #[tokio::test]
    async fn test_different_domains_independent() {
        let limiter = RateLimiter::new();
        let interval = Duration::from_secs(5);

        limiter.acquire("a.example.com", interval).await;
        let start = Instant::now();
        limiter.acquire("b.example.com", interval).await;

        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_concurrent_acquires_serialize() {
        let limiter = Arc::new(RateLimiter::new());
        let interval = Duration::from_millis(50);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire("example.com", interval).await;
                Instant::now()
            }));
        }

        let mut times: Vec<Instant> = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();

        for pair in times.windows(2) {
            // Small tolerance for timer resolution
            assert!(pair[1].duration_since(pair[0]) >= interval - Duration::from_millis(5));
        }
    }

    #[tokio::test]
    async fn test_last_request_recorded() {
        let limiter = RateLimiter::new();
        assert!(limiter.last_request_at("example.com").await.is_none());

        limiter
            .acquire("example.com", Duration::from_millis(10))
            .await;
        assert!(limiter.last_request_at("example.com").await.is_some());
    }

    #[test]
    fn test_effective_delay_default_wins() {
        let delay = effective_delay(Some(0.5), Duration::from_secs(1));
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[test]
    fn test_effective_delay_robots_wins() {
        let delay = effective_delay(Some(5.0), Duration::from_secs(1));
        assert_eq!(delay, Duration::from_secs(5));
    }

    #[test]
    fn test_effective_delay_no_robots() {
        let delay = effective_delay(None, Duration::from_millis(1500));
        assert_eq!(delay, Duration::from_millis(1500));
    }
}
