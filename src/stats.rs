//! Statistics reporting from the crawl database
//!
//! This module assembles per-source and global summaries for the `--stats`
//! mode. All derivation happens at read time; storage only keeps raw
//! counters.

use crate::storage::{SourceRecord, SourceStats, Storage};
use crate::ForagerError;

/// Per-source statistics joined with the source itself
#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub source: SourceRecord,
    pub stats: SourceStats,
}

/// Roll-up across every source
#[derive(Debug, Clone, Default)]
pub struct GlobalSummary {
    pub total_sources: u64,
    pub enabled_sources: u64,
    pub total_jobs: u64,
    pub successful_jobs: u64,
    pub failed_jobs: u64,
    pub total_candidates: u64,
    pub total_submitted: u64,
    pub total_duplicates: u64,
    pub total_rejected: u64,
    pub total_errors: u64,
}

/// Everything the `--stats` mode displays
#[derive(Debug, Clone)]
pub struct StatsReport {
    pub sources: Vec<SourceSummary>,
    pub global: GlobalSummary,
}

impl GlobalSummary {
    /// Fraction of jobs that completed, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_jobs == 0 {
            return 0.0;
        }
        (self.successful_jobs as f64 / self.total_jobs as f64) * 100.0
    }
}

/// Loads the full statistics report from storage
///
/// Sources that have never finished a job appear with zeroed stats.
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(StatsReport)` - Successfully loaded statistics
/// * `Err(ForagerError)` - Failed to query statistics
pub fn load_stats(storage: &dyn Storage) -> Result<StatsReport, ForagerError> {
    let mut sources = Vec::new();
    let mut global = GlobalSummary::default();

    for source in storage.list_sources()? {
        global.total_sources += 1;
        if source.enabled {
            global.enabled_sources += 1;
        }

        let stats = storage.get_stats(source.id)?.unwrap_or(SourceStats {
            source_id: source.id,
            ..Default::default()
        });

        global.total_jobs += stats.total_jobs;
        global.successful_jobs += stats.successful_jobs;
        global.failed_jobs += stats.failed_jobs;
        global.total_candidates += stats.total_candidates;
        global.total_submitted += stats.total_submitted;
        global.total_duplicates += stats.total_duplicates;
        global.total_rejected += stats.total_rejected;
        global.total_errors += stats.total_errors;

        sources.push(SourceSummary { source, stats });
    }

    Ok(StatsReport { sources, global })
}

/// Prints the report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_stats(report: &StatsReport) {
    println!("=== Forager Statistics ===\n");

    let g = &report.global;
    println!("Overview:");
    println!(
        "  Sources: {} ({} enabled)",
        g.total_sources, g.enabled_sources
    );
    println!(
        "  Jobs: {} ({} completed, {} failed, {:.1}% success)",
        g.total_jobs,
        g.successful_jobs,
        g.failed_jobs,
        g.success_rate()
    );
    println!("  Candidates found: {}", g.total_candidates);
    println!("  Submitted: {}", g.total_submitted);
    println!("  Duplicates: {}", g.total_duplicates);
    println!("  Rejected: {}", g.total_rejected);
    println!("  Errors: {}", g.total_errors);
    println!();

    println!("Per Source:");
    for summary in &report.sources {
        let source = &summary.source;
        let stats = &summary.stats;
        let flag = if source.enabled { "" } else { " [disabled]" };
        println!("  {} ({}){}", source.name, source.kind, flag);
        println!(
            "    jobs: {} ({} ok, {} failed)  submitted: {}  duplicates: {}  errors: {}",
            stats.total_jobs,
            stats.successful_jobs,
            stats.failed_jobs,
            stats.total_submitted,
            stats.total_duplicates,
            stats.total_errors
        );
        match &stats.last_crawl_at {
            Some(t) => println!("    last crawl: {}", t.to_rfc3339()),
            None => println!("    last crawl: never"),
        }
        if let (Some(status), Some(duration_ms)) =
            (stats.last_run_status, stats.last_run_duration_ms)
        {
            println!("    last run: {} in {}ms", status, duration_ms);
        }
    }
}
