//! Crawler orchestration
//!
//! This module wires the scheduler and job executor together:
//! - The scheduler wakes on a fixed tick and dispatches due sources
//! - The executor runs one crawl job per source through discovery,
//!   filtering, fetching, extraction, and submission

mod executor;
mod scheduler;

pub use executor::Executor;
pub use scheduler::Scheduler;

use crate::config::Config;
use crate::fetch::{build_http_client, Fetcher, RateLimiter};
use crate::robots::RobotsCache;
use crate::storage::SqliteStorage;
use crate::submit;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Builds a fully wired scheduler from configuration
///
/// Opens the database, constructs the shared HTTP client, robots cache,
/// and rate limiter, and assembles the executor behind a scheduler.
///
/// # Arguments
///
/// * `config` - The loaded crawler configuration
///
/// # Returns
///
/// * `Ok(Scheduler)` - Ready to run
/// * `Err(ForagerError)` - Storage or HTTP client initialization failed
pub fn build_scheduler(config: &Config) -> crate::Result<Scheduler> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let storage = Arc::new(Mutex::new(storage));

    let timeout = Duration::from_secs(config.crawler.request_timeout_secs);
    let client = build_http_client(&config.user_agent, timeout)?;
    let user_agent = config.user_agent.user_agent_string();

    let robots = Arc::new(RobotsCache::new(client.clone(), user_agent.clone()));
    let limiter = Arc::new(RateLimiter::new());
    let fetcher = Arc::new(Fetcher::new(client, robots, limiter, &config.crawler));

    let intake = submit::build_intake(&config.intake, &user_agent)?;

    let executor = Arc::new(Executor::new(
        Arc::clone(&storage),
        fetcher,
        intake,
        config.crawler.clone(),
    ));

    Ok(Scheduler::new(
        storage,
        executor,
        Duration::from_secs(config.crawler.tick_interval_secs),
        config.crawler.max_concurrent_jobs,
    ))
}
