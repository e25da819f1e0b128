//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{HistoryOutcome, JobCounts, JobRecord, JobStatus, SourceRecord, SourceStats};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Source not found: {0}")]
    SourceNotFound(i64),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler.
/// Implementations should provide thread-safe access to the underlying storage.
pub trait Storage {
    // ===== Source Management =====

    /// Inserts a source or updates an existing one, keyed by name
    ///
    /// Updating preserves the stored `next_crawl_at` so configuration
    /// reloads do not reset schedules.
    ///
    /// # Arguments
    ///
    /// * `source` - The source definition; the `id` field is ignored
    ///
    /// # Returns
    ///
    /// The ID of the inserted or existing source
    fn upsert_source(&mut self, source: &SourceRecord) -> StorageResult<i64>;

    /// Gets a source by ID
    fn get_source(&self, source_id: i64) -> StorageResult<SourceRecord>;

    /// Lists all sources, ordered by ID
    fn list_sources(&self) -> StorageResult<Vec<SourceRecord>>;

    /// Lists enabled sources that are due at `now`
    ///
    /// A source with no `next_crawl_at` is due immediately. Results are
    /// ordered earliest-due first, with never-crawled sources leading.
    fn due_sources(&self, now: DateTime<Utc>) -> StorageResult<Vec<SourceRecord>>;

    /// Sets when a source is next due
    fn set_next_crawl(&mut self, source_id: i64, when: DateTime<Utc>) -> StorageResult<()>;

    // ===== Job Management =====

    /// Creates a new running job for a source
    ///
    /// # Returns
    ///
    /// The ID of the newly created job
    fn create_job(&mut self, source_id: i64) -> StorageResult<i64>;

    /// Finalizes a job with its terminal status and counters
    fn finish_job(
        &mut self,
        job_id: i64,
        status: JobStatus,
        counts: JobCounts,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord>;

    /// Gets the most recent jobs, newest first
    fn recent_jobs(&self, limit: u32) -> StorageResult<Vec<JobRecord>>;

    // ===== History Ledger =====

    /// Checks whether a source has already produced this URL
    fn history_contains(&self, source_id: i64, url: &str) -> StorageResult<bool>;

    /// Records the outcome for a candidate URL
    ///
    /// A second sighting of the same URL updates the existing row:
    /// outcome and `last_seen_at` are replaced and `times_seen` grows.
    fn record_history(
        &mut self,
        source_id: i64,
        url: &str,
        outcome: HistoryOutcome,
        title: Option<&str>,
    ) -> StorageResult<()>;

    /// Counts history entries for a source
    fn history_count(&self, source_id: i64) -> StorageResult<u64>;

    // ===== Statistics =====

    /// Gets lifetime aggregates for a source, if any job has finished
    fn get_stats(&self, source_id: i64) -> StorageResult<Option<SourceStats>>;

    /// Folds a finished job into the source's lifetime aggregates
    ///
    /// Also records the status and duration of this run, overwriting the
    /// previous job's values.
    fn apply_job_stats(
        &mut self,
        source_id: i64,
        status: JobStatus,
        counts: JobCounts,
        duration_ms: u64,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()>;
}
