//! Per-domain robots.txt cache
//!
//! Policies are fetched lazily on first access and expire after a TTL,
//! after which the next access refetches them. A failed fetch caches a
//! permissive policy so an unreachable robots.txt never blocks a domain.

use crate::robots::parser::RobotsPolicy;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use tokio::sync::Mutex;
use url::Url;

/// How long a fetched policy stays valid
const POLICY_TTL_HOURS: i64 = 24;

/// A cached robots.txt policy with its fetch timestamp
#[derive(Debug, Clone)]
struct CachedPolicy {
    policy: RobotsPolicy,
    fetched_at: DateTime<Utc>,
}

impl CachedPolicy {
    fn new(policy: RobotsPolicy) -> Self {
        Self {
            policy,
            fetched_at: Utc::now(),
        }
    }

    fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(POLICY_TTL_HOURS)
    }
}

/// Lazily-populated robots.txt cache shared by all crawl jobs
pub struct RobotsCache {
    client: Client,
    user_agent: String,
    entries: Mutex<HashMap<String, CachedPolicy>>,
}

impl RobotsCache {
    /// Creates a new cache using the given HTTP client
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client (carries the crawler's user agent)
    /// * `user_agent` - Full user agent string, matched against robots stanzas
    pub fn new(client: Client, user_agent: String) -> Self {
        Self {
            client,
            user_agent,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether a URL may be fetched according to its domain's robots.txt
    ///
    /// Fetches and caches the policy on first access or after expiry.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let policy = self.policy_for(url).await;
        policy.is_allowed(url.as_str(), &self.user_agent)
    }

    /// Gets the robots.txt crawl delay in seconds for a domain, if any
    pub async fn crawl_delay(&self, url: &Url) -> Option<f64> {
        let policy = self.policy_for(url).await;
        policy.crawl_delay(&self.user_agent)
    }

    /// Returns the current policy for a URL's domain, fetching if needed
    async fn policy_for(&self, url: &Url) -> RobotsPolicy {
        let Some(host) = url.host_str() else {
            return RobotsPolicy::allow_all();
        };
        let domain = host.to_lowercase();

        {
            let entries = self.entries.lock().await;
            if let Some(cached) = entries.get(&domain) {
                if !cached.is_stale() {
                    return cached.policy.clone();
                }
            }
        }

        // Cache miss or stale entry. The lock is not held across the fetch;
        // concurrent jobs may race to refetch the same domain, which only
        // costs a duplicate request.
        tracing::debug!("Fetching robots.txt for domain: {}", domain);
        let policy = self.fetch_policy(url.scheme(), host, url.port()).await;

        let mut entries = self.entries.lock().await;
        entries.insert(domain, CachedPolicy::new(policy.clone()));
        policy
    }

    /// Fetches and parses /robots.txt, falling back to permissive on failure
    async fn fetch_policy(&self, scheme: &str, host: &str, port: Option<u16>) -> RobotsPolicy {
        let robots_url = match port {
            Some(p) => format!("{}://{}:{}/robots.txt", scheme, host, p),
            None => format!("{}://{}/robots.txt", scheme, host),
        };

        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => RobotsPolicy::from_content(&body),
                Err(e) => {
                    tracing::debug!("Failed to read robots.txt body from {}: {}", robots_url, e);
                    RobotsPolicy::allow_all()
                }
            },
            Ok(response) => {
                tracing::debug!(
                    "robots.txt at {} returned HTTP {}, allowing all",
                    robots_url,
                    response.status()
                );
                RobotsPolicy::allow_all()
            }
            Err(e) => {
                tracing::debug!("Failed to fetch robots.txt from {}: {}", robots_url, e);
                RobotsPolicy::allow_all()
            }
        }
    }

    /// Number of domains currently cached
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
