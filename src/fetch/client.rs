//! HTTP fetcher implementation
//!
//! All outbound page requests go through [`Fetcher::fetch`], which checks
//! robots.txt, waits on the shared per-domain rate limiter, and only then
//! issues the GET. Errors are classified into the candidate-level
//! [`FetchError`] taxonomy.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::fetch::rate_limit::{effective_delay, RateLimiter};
use crate::robots::RobotsCache;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// Errors that can occur while fetching a single URL
///
/// These fail only the one candidate being fetched, never the whole job.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("URL disallowed by robots.txt: {url}")]
    RobotsDisallowed { url: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value (empty if absent)
    pub content_type: String,

    /// Response body
    pub body: String,
}

/// Builds the shared HTTP client with user agent, timeout, and redirect policy
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Hard per-request timeout
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.user_agent_string())
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Politeness-aware page fetcher shared by all crawl jobs
pub struct Fetcher {
    client: Client,
    robots: Arc<RobotsCache>,
    limiter: Arc<RateLimiter>,
    default_delay: Duration,
}

impl Fetcher {
    /// Creates a new fetcher
    ///
    /// # Arguments
    ///
    /// * `client` - The shared HTTP client
    /// * `robots` - The robots.txt policy cache
    /// * `limiter` - The shared per-domain rate limiter
    /// * `config` - Crawler configuration (default crawl delay)
    pub fn new(
        client: Client,
        robots: Arc<RobotsCache>,
        limiter: Arc<RateLimiter>,
        config: &CrawlerConfig,
    ) -> Self {
        Self {
            client,
            robots,
            limiter,
            default_delay: Duration::from_millis(config.default_crawl_delay_ms),
        }
    }

    /// Fetches a URL, enforcing robots.txt and per-domain rate limits
    ///
    /// # Request Flow
    ///
    /// 1. Query the robots cache; a disallowed URL returns
    ///    [`FetchError::RobotsDisallowed`] without touching the network
    /// 2. Wait on the rate limiter for the domain's effective delay
    ///    (max of robots crawl-delay and the configured default)
    /// 3. Issue the GET with the client's hard timeout and redirect cap
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - 2xx response with its body
    /// * `Err(FetchError)` - Classified failure for this one URL
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if !self.robots.is_allowed(url).await {
            tracing::debug!("Robots.txt disallows {}", url);
            return Err(FetchError::RobotsDisallowed {
                url: url.to_string(),
            });
        }

        let domain = url
            .host_str()
            .map(|h| h.to_lowercase())
            .unwrap_or_default();

        let robots_delay = self.robots.crawl_delay(url).await;
        let delay = effective_delay(robots_delay, self.default_delay);
        self.limiter.acquire(&domain, delay).await;

        tracing::trace!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_request_error(url, e))?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(url, e))?;

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_request_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_user_agent() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/bot".to_string(),
            contact_email: "crawler@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_user_agent();
        assert!(build_http_client(&config, Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn test_user_agent_string_format() {
        let config = create_test_user_agent();
        assert_eq!(
            config.user_agent_string(),
            "TestBot/1.0 (+https://example.com/bot; crawler@example.com)"
        );
    }

    // Fetch behavior (robots denial, timeout classification, rate limit
    // spacing) is covered end-to-end with wiremock in tests/crawl_tests.rs.
}
