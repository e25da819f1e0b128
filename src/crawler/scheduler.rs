//! Tick-driven crawl scheduler
//!
//! A fixed-interval timer wakes the scheduler, which loads every enabled
//! source that has come due and dispatches each as an independent task.
//! A semaphore caps how many jobs run at once; a saturated pool simply
//! leaves the source due for the next tick. The tick loop never waits for
//! job completion, but on ctrl-c it stops dispatching and drains the
//! in-flight jobs before returning.

use crate::crawler::executor::Executor;
use crate::storage::{SourceRecord, SqliteStorage, Storage};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Drives periodic crawls of all due sources
pub struct Scheduler {
    storage: Arc<Mutex<SqliteStorage>>,
    executor: Arc<Executor>,
    tick_interval: Duration,
    permits: Arc<Semaphore>,
    /// Source IDs with a job currently in flight
    running: Arc<Mutex<HashSet<i64>>>,
}

/// Marks a source as in flight for as long as the guard lives
///
/// The marker is released on drop, so a panicking job cannot leave its
/// source permanently blocked from dispatch.
struct RunningGuard {
    running: Arc<Mutex<HashSet<i64>>>,
    source_id: i64,
}

impl RunningGuard {
    /// Claims the in-flight marker for a source
    ///
    /// Returns `None` if a job for this source is already running.
    fn acquire(running: &Arc<Mutex<HashSet<i64>>>, source_id: i64) -> Option<Self> {
        if running.lock().unwrap().insert(source_id) {
            Some(Self {
                running: Arc::clone(running),
                source_id,
            })
        } else {
            None
        }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&self.source_id);
        }
    }
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `storage` - Shared storage handle
    /// * `executor` - The job executor shared by all dispatched tasks
    /// * `tick_interval` - Time between scheduler wake-ups
    /// * `max_concurrent_jobs` - Cap on simultaneously running jobs
    pub fn new(
        storage: Arc<Mutex<SqliteStorage>>,
        executor: Arc<Executor>,
        tick_interval: Duration,
        max_concurrent_jobs: u32,
    ) -> Self {
        Self {
            storage,
            executor,
            tick_interval,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs as usize)),
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Runs the scheduler until ctrl-c
    ///
    /// The first tick fires immediately. On shutdown, dispatching stops
    /// and every in-flight job is awaited before this returns, so no job
    /// is cancelled mid-candidate by runtime teardown.
    pub async fn run(&self) -> crate::Result<()> {
        info!(
            interval_secs = self.tick_interval.as_secs(),
            "Scheduler started"
        );

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    in_flight.retain(|handle| !handle.is_finished());
                    match self.dispatch_due_sources().await {
                        Ok(handles) => {
                            if !handles.is_empty() {
                                debug!(dispatched = handles.len(), "Tick dispatched jobs");
                            }
                            in_flight.extend(handles);
                        }
                        Err(e) => error!(error = %e, "Scheduler tick failed"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!(
                        in_flight = in_flight.len(),
                        "Shutdown requested; waiting for in-flight jobs"
                    );
                    break;
                }
            }
        }

        drain_jobs(in_flight).await;
        Ok(())
    }

    /// Runs exactly one tick and waits for the jobs it dispatched
    ///
    /// Used by the `--once` mode and the test suite, where the caller
    /// needs every dispatched job finished before inspecting state.
    pub async fn run_once(&self) -> crate::Result<usize> {
        let handles = self.dispatch_due_sources().await?;
        let dispatched = handles.len();
        drain_jobs(handles).await;
        Ok(dispatched)
    }

    /// Crawls one source immediately, bypassing its schedule
    ///
    /// The job goes through the same executor and in-flight guard as
    /// scheduled crawls, so politeness, history, stats, and the
    /// one-job-per-source rule all apply. A source already being crawled
    /// is skipped rather than double-run.
    pub async fn trigger(&self, source_id: i64) -> crate::Result<()> {
        let source = {
            let storage = self.storage.lock().unwrap();
            storage
                .get_source(source_id)
                .map_err(|_| crate::ForagerError::SourceNotFound(source_id))?
        };

        let Some(guard) = RunningGuard::acquire(&self.running, source_id) else {
            warn!(source = %source.name, "Job already in flight; trigger skipped");
            return Ok(());
        };

        info!(source = %source.name, "Manual crawl triggered");
        let result = self.executor.run_job(&source).await;
        drop(guard);
        result?;
        Ok(())
    }

    async fn dispatch_due_sources(&self) -> crate::Result<Vec<JoinHandle<()>>> {
        let due = {
            let storage = self.storage.lock().unwrap();
            storage.due_sources(Utc::now())?
        };

        let mut handles = Vec::new();
        for source in due {
            if let Some(handle) = self.dispatch(source) {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    /// Dispatches one source as a task, if it is not already running and
    /// a permit is free
    fn dispatch(&self, source: SourceRecord) -> Option<JoinHandle<()>> {
        let Some(guard) = RunningGuard::acquire(&self.running, source.id) else {
            debug!(source = %source.name, "Job already in flight; skipping");
            return None;
        };

        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                // Pool saturated: dropping the guard releases the marker
                // so the next tick retries this source.
                debug!(source = %source.name, "Job pool saturated; source stays due");
                return None;
            }
        };

        let executor = Arc::clone(&self.executor);

        Some(tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            if let Err(e) = executor.run_job(&source).await {
                warn!(source = %source.name, error = %e, "Crawl job errored");
            }
        }))
    }
}

/// Awaits every dispatched job, logging panics
async fn drain_jobs(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Crawl task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_guard_releases_marker_on_drop() {
        let running = Arc::new(Mutex::new(HashSet::new()));

        let guard = RunningGuard::acquire(&running, 7).unwrap();
        assert!(RunningGuard::acquire(&running, 7).is_none());

        drop(guard);
        assert!(RunningGuard::acquire(&running, 7).is_some());
    }

    #[tokio::test]
    async fn test_guard_releases_marker_on_panic() {
        let running = Arc::new(Mutex::new(HashSet::new()));

        let task_running = Arc::clone(&running);
        let handle = tokio::spawn(async move {
            let _guard = RunningGuard::acquire(&task_running, 7).unwrap();
            panic!("job blew up");
        });
        assert!(handle.await.is_err());

        // The panicked task must not leave the source blocked
        assert!(RunningGuard::acquire(&running, 7).is_some());
    }

    #[tokio::test]
    async fn test_drain_jobs_waits_for_completion() {
        let finished = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&finished);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        });

        drain_jobs(vec![handle]).await;
        assert!(finished.load(Ordering::SeqCst));
    }
}
