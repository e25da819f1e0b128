//! Forager: a polite content-discovery crawler
//!
//! This crate implements a scheduler-driven crawler that periodically polls
//! registered sources (RSS/Atom feeds, XML sitemaps, plain websites),
//! deduplicates discovered URLs against crawl history, extracts normalized
//! metadata from each new page, and submits the results to a downstream
//! content-intake service. It respects robots.txt and per-domain rate limits.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod fetch;
pub mod robots;
pub mod sources;
pub mod stats;
pub mod storage;
pub mod submit;
pub mod urlnorm;

use thiserror::Error;

/// Main error type for Forager operations
#[derive(Debug, Error)]
pub enum ForagerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] sources::ParseError),

    #[error("Submission error: {0}")]
    Submission(#[from] submit::SubmissionError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Unknown source id: {0}")]
    SourceNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Forager operations
pub type Result<T> = std::result::Result<T, ForagerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::ExtractedMetadata;
pub use sources::{Candidate, SourceKind};
pub use storage::{HistoryOutcome, JobStatus, SourceRecord};
pub use urlnorm::{extract_domain, normalize_url};
