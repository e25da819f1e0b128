//! Robots.txt handling module
//!
//! Provides fetching, parsing, and caching of robots.txt policies. The
//! cache answers allow/deny and crawl-delay queries for the fetcher and the
//! rate limiter.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::RobotsPolicy;
