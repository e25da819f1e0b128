//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::sources::SourceKind;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{HistoryOutcome, JobCounts, JobRecord, JobStatus, SourceRecord, SourceStats};
use crate::ForagerError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ForagerError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ForagerError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, ForagerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn row_to_source(row: &Row<'_>) -> rusqlite::Result<SourceRecord> {
        let kind: String = row.get(2)?;
        let topics: String = row.get(5)?;
        let next_crawl_at: Option<String> = row.get(9)?;
        Ok(SourceRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: SourceKind::from_str(&kind).unwrap_or(SourceKind::Web),
            url: row.get(3)?,
            crawl_frequency_hours: row.get(4)?,
            topics: serde_json::from_str(&topics).unwrap_or_default(),
            enabled: row.get(6)?,
            aggregator: row.get(7)?,
            allow_external: row.get(8)?,
            next_crawl_at: next_crawl_at.as_deref().and_then(parse_timestamp),
        })
    }

    fn row_to_job(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
        let status: String = row.get(2)?;
        Ok(JobRecord {
            id: row.get(0)?,
            source_id: row.get(1)?,
            status: JobStatus::from_db_string(&status).unwrap_or(JobStatus::Failed),
            started_at: row.get(3)?,
            finished_at: row.get(4)?,
            counts: JobCounts {
                candidates_found: row.get(5)?,
                submitted: row.get(6)?,
                duplicates: row.get(7)?,
                rejected: row.get(8)?,
                errors: row.get(9)?,
            },
            error_message: row.get(10)?,
        })
    }
}

const SOURCE_COLUMNS: &str = "id, name, kind, url, crawl_frequency_hours, topics, enabled, \
     aggregator, allow_external, next_crawl_at";

const JOB_COLUMNS: &str = "id, source_id, status, started_at, finished_at, candidates_found, \
     submitted, duplicates, rejected, errors, error_message";

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl Storage for SqliteStorage {
    // ===== Source Management =====

    fn upsert_source(&mut self, source: &SourceRecord) -> StorageResult<i64> {
        let topics = serde_json::to_string(&source.topics)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM sources WHERE name = ?1",
                params![source.name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            self.conn.execute(
                "UPDATE sources SET kind = ?1, url = ?2, crawl_frequency_hours = ?3,
                 topics = ?4, enabled = ?5, aggregator = ?6, allow_external = ?7
                 WHERE id = ?8",
                params![
                    source.kind.as_str(),
                    source.url,
                    source.crawl_frequency_hours,
                    topics,
                    source.enabled,
                    source.aggregator,
                    source.allow_external,
                    id
                ],
            )?;
            return Ok(id);
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sources (name, kind, url, crawl_frequency_hours, topics, enabled,
             aggregator, allow_external, next_crawl_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                source.name,
                source.kind.as_str(),
                source.url,
                source.crawl_frequency_hours,
                topics,
                source.enabled,
                source.aggregator,
                source.allow_external,
                source.next_crawl_at.map(|t| t.to_rfc3339()),
                now
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_source(&self, source_id: i64) -> StorageResult<SourceRecord> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM sources WHERE id = ?1", SOURCE_COLUMNS))?;

        stmt.query_row(params![source_id], Self::row_to_source)
            .map_err(|_| StorageError::SourceNotFound(source_id))
    }

    fn list_sources(&self) -> StorageResult<Vec<SourceRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM sources ORDER BY id", SOURCE_COLUMNS))?;

        let sources = stmt
            .query_map([], Self::row_to_source)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn due_sources(&self, now: DateTime<Utc>) -> StorageResult<Vec<SourceRecord>> {
        // NULL next_crawl_at means the source has never been crawled;
        // it sorts ahead of every dated source.
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM sources
             WHERE enabled = 1 AND (next_crawl_at IS NULL OR next_crawl_at <= ?1)
             ORDER BY next_crawl_at IS NOT NULL, next_crawl_at",
            SOURCE_COLUMNS
        ))?;

        let sources = stmt
            .query_map(params![now.to_rfc3339()], Self::row_to_source)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn set_next_crawl(&mut self, source_id: i64, when: DateTime<Utc>) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE sources SET next_crawl_at = ?1 WHERE id = ?2",
            params![when.to_rfc3339(), source_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SourceNotFound(source_id));
        }
        Ok(())
    }


    // ===== Job Management =====

    fn create_job(&mut self, source_id: i64) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_jobs (source_id, status, started_at) VALUES (?1, ?2, ?3)",
            params![source_id, JobStatus::Running.to_db_string(), now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_job(
        &mut self,
        job_id: i64,
        status: JobStatus,
        counts: JobCounts,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawl_jobs SET status = ?1, finished_at = ?2, candidates_found = ?3,
             submitted = ?4, duplicates = ?5, rejected = ?6, errors = ?7, error_message = ?8
             WHERE id = ?9",
            params![
                status.to_db_string(),
                now,
                counts.candidates_found,
                counts.submitted,
                counts.duplicates,
                counts.rejected,
                counts.errors,
                error_message,
                job_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS))?;

        stmt.query_row(params![job_id], Self::row_to_job)
            .map_err(|_| StorageError::JobNotFound(job_id))
    }

    fn recent_jobs(&self, limit: u32) -> StorageResult<Vec<JobRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM crawl_jobs ORDER BY id DESC LIMIT ?1",
            JOB_COLUMNS
        ))?;

        let jobs = stmt
            .query_map(params![limit], Self::row_to_job)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    // ===== History Ledger =====

    fn history_contains(&self, source_id: i64, url: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM crawl_history WHERE source_id = ?1 AND url = ?2",
                params![source_id, url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn record_history(
        &mut self,
        source_id: i64,
        url: &str,
        outcome: HistoryOutcome,
        title: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_history (source_id, url, outcome, title, first_seen_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(source_id, url) DO UPDATE SET
                 outcome = excluded.outcome,
                 title = COALESCE(excluded.title, title),
                 last_seen_at = excluded.last_seen_at,
                 times_seen = times_seen + 1",
            params![source_id, url, outcome.to_db_string(), title, now],
        )?;
        Ok(())
    }

    fn history_count(&self, source_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM crawl_history WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Statistics =====

    fn get_stats(&self, source_id: i64) -> StorageResult<Option<SourceStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, total_jobs, successful_jobs, failed_jobs, total_candidates,
             total_submitted, total_duplicates, total_rejected, total_errors,
             last_crawl_at, last_success_at, last_run_status, last_run_duration_ms
             FROM source_stats WHERE source_id = ?1",
        )?;

        let stats = stmt
            .query_row(params![source_id], |row| {
                let last_crawl_at: Option<String> = row.get(9)?;
                let last_success_at: Option<String> = row.get(10)?;
                let last_run_status: Option<String> = row.get(11)?;
                let last_run_duration_ms: Option<i64> = row.get(12)?;
                Ok(SourceStats {
                    source_id: row.get(0)?,
                    total_jobs: row.get::<_, i64>(1)? as u64,
                    successful_jobs: row.get::<_, i64>(2)? as u64,
                    failed_jobs: row.get::<_, i64>(3)? as u64,
                    total_candidates: row.get::<_, i64>(4)? as u64,
                    total_submitted: row.get::<_, i64>(5)? as u64,
                    total_duplicates: row.get::<_, i64>(6)? as u64,
                    total_rejected: row.get::<_, i64>(7)? as u64,
                    total_errors: row.get::<_, i64>(8)? as u64,
                    last_crawl_at: last_crawl_at.as_deref().and_then(parse_timestamp),
                    last_success_at: last_success_at.as_deref().and_then(parse_timestamp),
                    last_run_status: last_run_status
                        .as_deref()
                        .and_then(JobStatus::from_db_string),
                    last_run_duration_ms: last_run_duration_ms.map(|ms| ms.max(0) as u64),
                })
            })
            .optional()?;

        Ok(stats)
    }

    fn apply_job_stats(
        &mut self,
        source_id: i64,
        status: JobStatus,
        counts: JobCounts,
        duration_ms: u64,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let succeeded = status == JobStatus::Completed;
        let finished = finished_at.to_rfc3339();
        let success_time = succeeded.then(|| finished.clone());

        self.conn.execute(
            "INSERT INTO source_stats (source_id, total_jobs, successful_jobs, failed_jobs,
                 total_candidates, total_submitted, total_duplicates, total_rejected,
                 total_errors, last_crawl_at, last_success_at, last_run_status,
                 last_run_duration_ms)
             VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(source_id) DO UPDATE SET
                 total_jobs = total_jobs + 1,
                 successful_jobs = successful_jobs + excluded.successful_jobs,
                 failed_jobs = failed_jobs + excluded.failed_jobs,
                 total_candidates = total_candidates + excluded.total_candidates,
                 total_submitted = total_submitted + excluded.total_submitted,
                 total_duplicates = total_duplicates + excluded.total_duplicates,
                 total_rejected = total_rejected + excluded.total_rejected,
                 total_errors = total_errors + excluded.total_errors,
                 last_crawl_at = excluded.last_crawl_at,
                 last_success_at = COALESCE(excluded.last_success_at, last_success_at),
                 last_run_status = excluded.last_run_status,
                 last_run_duration_ms = excluded.last_run_duration_ms",
            params![
                source_id,
                succeeded as i64,
                (!succeeded) as i64,
                counts.candidates_found,
                counts.submitted,
                counts.duplicates,
                counts.rejected,
                counts.errors,
                finished,
                success_time,
                status.to_db_string(),
                duration_ms as i64
            ],
        )?;
        Ok(())
    }
}
