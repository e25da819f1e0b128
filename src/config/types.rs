use serde::Deserialize;

/// Main configuration structure for Forager
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Seconds between scheduler ticks
    #[serde(rename = "tick-interval-secs", default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Maximum number of crawl jobs running at the same time
    #[serde(rename = "max-concurrent-jobs", default = "default_max_jobs")]
    pub max_concurrent_jobs: u32,

    /// Minimum time between requests to the same domain (milliseconds),
    /// used when robots.txt specifies no crawl delay
    #[serde(rename = "default-crawl-delay-ms", default = "default_crawl_delay")]
    pub default_crawl_delay_ms: u64,

    /// Hard timeout applied to each HTTP request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Drop candidates whose published date is older than this many days.
    /// Zero disables the window.
    #[serde(rename = "recency-window-days", default)]
    pub recency_window_days: u32,

    /// When set, a failed job reschedules the source after this many hours
    /// instead of its normal crawl frequency
    #[serde(rename = "retry-backoff-hours")]
    pub retry_backoff_hours: Option<u32>,

    /// Maximum jitter (seconds) added to next-crawl times to spread
    /// simultaneously-due sources across ticks. Zero disables jitter.
    #[serde(rename = "next-crawl-jitter-secs", default)]
    pub next_crawl_jitter_secs: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Content-intake service configuration
///
/// When `endpoint` is unset, discovered items are logged instead of
/// submitted. That mode is intended for dry runs and local testing.
#[derive(Debug, Clone, Deserialize)]
pub struct IntakeConfig {
    /// Endpoint URL of the content-intake service
    pub endpoint: Option<String>,

    /// Bearer token sent with each submission
    #[serde(rename = "api-key")]
    pub api_key: Option<String>,

    /// Timeout for submission requests (seconds)
    #[serde(rename = "timeout-secs", default = "default_intake_timeout")]
    pub timeout_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_tick_interval() -> u64 {
    900
}

fn default_max_jobs() -> u32 {
    5
}

fn default_crawl_delay() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    10
}

fn default_intake_timeout() -> u64 {
    10
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_intake_timeout(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the full user agent string: `Name/Version (+URL; email)`
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}
