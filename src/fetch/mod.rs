//! HTTP fetching module
//!
//! Contains the shared HTTP client builder, the politeness-aware fetcher,
//! and the per-domain rate limiter it consults before every request.

mod client;
mod rate_limit;

pub use client::{build_http_client, FetchError, FetchedPage, Fetcher};
pub use rate_limit::{effective_delay, RateLimiter};
