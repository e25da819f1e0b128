//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Source registration and scheduling state
//! - Crawl job tracking
//! - Per-source history ledger for deduplication
//! - Aggregate per-source statistics

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::sources::SourceKind;
use crate::ForagerError;
use chrono::{DateTime, Utc};

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(ForagerError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ForagerError> {
    SqliteStorage::new(path)
}

/// A registered content source
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: i64,
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
    pub crawl_frequency_hours: u32,
    pub topics: Vec<String>,
    pub enabled: bool,
    pub aggregator: bool,
    pub allow_external: bool,
    /// When this source is next due; NULL means due immediately
    pub next_crawl_at: Option<DateTime<Utc>>,
}

/// A single crawl job against a source
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub source_id: i64,
    pub status: JobStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub counts: JobCounts,
    pub error_message: Option<String>,
}

/// Outcome counters accumulated over one job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub candidates_found: u32,
    pub submitted: u32,
    pub duplicates: u32,
    pub rejected: u32,
    pub errors: u32,
}

/// Lifetime aggregates for one source
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    pub source_id: i64,
    pub total_jobs: u64,
    pub successful_jobs: u64,
    pub failed_jobs: u64,
    pub total_candidates: u64,
    pub total_submitted: u64,
    pub total_duplicates: u64,
    pub total_rejected: u64,
    pub total_errors: u64,
    pub last_crawl_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_run_status: Option<JobStatus>,
    pub last_run_duration_ms: Option<u64>,
}

/// Status of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Final outcome of processing one candidate URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    Submitted,
    Duplicate,
    Rejected,
    Error,
}

impl HistoryOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Duplicate => "duplicate",
            Self::Rejected => "rejected",
            Self::Error => "error",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(Self::Submitted),
            "duplicate" => Some(Self::Duplicate),
            "rejected" => Some(Self::Rejected),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}
