//! Crawl job executor
//!
//! Runs one crawl job end to end: discover candidates from the source,
//! filter them against history and the recency window, then fetch, extract,
//! and submit each survivor independently. A candidate failure never aborts
//! the job; only a failed source parse does. Either way the source's
//! next-crawl time advances so a broken source cannot wedge the scheduler.

use crate::config::CrawlerConfig;
use crate::extract::{self, Sourced};
use crate::fetch::Fetcher;
use crate::sources::{discover_candidates, Candidate};
use crate::storage::{
    HistoryOutcome, JobCounts, JobStatus, SourceRecord, SqliteStorage, Storage,
};
use crate::submit::{Intake, SubmitOutcome};
use crate::urlnorm::normalize_url;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Executes crawl jobs against registered sources
pub struct Executor {
    storage: Arc<Mutex<SqliteStorage>>,
    fetcher: Arc<Fetcher>,
    intake: Arc<dyn Intake>,
    config: CrawlerConfig,
}

/// A candidate that survived filtering, keyed by its normalized URL
struct Survivor {
    normalized: String,
    candidate: Candidate,
}

impl Executor {
    /// Creates a new executor
    ///
    /// # Arguments
    ///
    /// * `storage` - Shared storage handle
    /// * `fetcher` - Shared politeness-aware fetcher
    /// * `intake` - Submission client for discovered items
    /// * `config` - Crawler configuration
    pub fn new(
        storage: Arc<Mutex<SqliteStorage>>,
        fetcher: Arc<Fetcher>,
        intake: Arc<dyn Intake>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            storage,
            fetcher,
            intake,
            config,
        }
    }

    /// Runs one crawl job for a source
    ///
    /// The job is recorded as running before any network activity and is
    /// always finalized, with the source rescheduled, before this returns.
    ///
    /// # Returns
    ///
    /// The terminal status of the job
    pub async fn run_job(&self, source: &SourceRecord) -> crate::Result<JobStatus> {
        let started_at = Utc::now();
        let job_id = {
            let mut storage = self.storage.lock().unwrap();
            storage.create_job(source.id)?
        };

        info!(source = %source.name, job_id, kind = %source.kind, "Starting crawl job");

        let candidates = match discover_candidates(&self.fetcher, source).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(source = %source.name, job_id, error = %e, "Source parse failed");
                let message = e.to_string();
                self.finalize(
                    job_id,
                    source,
                    JobStatus::Failed,
                    JobCounts::default(),
                    Some(&message),
                    started_at,
                )?;
                return Ok(JobStatus::Failed);
            }
        };

        let mut counts = JobCounts {
            candidates_found: candidates.len() as u32,
            ..Default::default()
        };

        let survivors = self.filter_candidates(source, candidates, &mut counts)?;
        debug!(
            source = %source.name,
            job_id,
            found = counts.candidates_found,
            new = survivors.len(),
            "Candidates filtered"
        );

        for survivor in survivors {
            self.process_candidate(source, &survivor, &mut counts).await;
        }

        self.finalize(job_id, source, JobStatus::Completed, counts, None, started_at)?;

        info!(
            source = %source.name,
            job_id,
            found = counts.candidates_found,
            submitted = counts.submitted,
            duplicates = counts.duplicates,
            errors = counts.errors,
            "Crawl job completed"
        );

        Ok(JobStatus::Completed)
    }

    /// Drops history hits and stale candidates, normalizing URLs
    ///
    /// History hits count as duplicates and refresh their ledger entry.
    /// Candidates with an unparseable URL count as errors. Candidates older
    /// than the recency window are dropped without a ledger entry: they are
    /// not new content, and recording them would grow history unboundedly
    /// for archives that list years of posts.
    fn filter_candidates(
        &self,
        source: &SourceRecord,
        candidates: Vec<Candidate>,
        counts: &mut JobCounts,
    ) -> crate::Result<Vec<Survivor>> {
        let cutoff = recency_cutoff(self.config.recency_window_days, Utc::now());
        let mut survivors = Vec::new();
        let mut storage = self.storage.lock().unwrap();

        for candidate in candidates {
            let normalized = match normalize_url(candidate.url.as_str()) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    debug!(url = %candidate.url, error = %e, "Dropping unnormalizable candidate");
                    counts.errors += 1;
                    continue;
                }
            };

            if let (Some(cutoff), Some(published)) = (cutoff, candidate.published) {
                if published < cutoff {
                    debug!(url = %normalized, %published, "Dropping stale candidate");
                    continue;
                }
            }

            if storage.history_contains(source.id, &normalized)? {
                counts.duplicates += 1;
                storage.record_history(
                    source.id,
                    &normalized,
                    HistoryOutcome::Duplicate,
                    candidate.title.as_deref(),
                )?;
                continue;
            }

            survivors.push(Survivor {
                normalized,
                candidate,
            });
        }

        Ok(survivors)
    }

    /// Fetches, extracts, and submits one candidate
    ///
    /// Exactly one history entry is recorded, after the candidate's
    /// sequence completes or definitively fails.
    async fn process_candidate(
        &self,
        source: &SourceRecord,
        survivor: &Survivor,
        counts: &mut JobCounts,
    ) {
        let url = &survivor.normalized;

        let (outcome, title) = match self.fetch_extract_submit(source, survivor).await {
            Ok((outcome, title)) => (outcome, title),
            Err(e) => {
                warn!(source = %source.name, url = %url, error = %e, "Candidate failed");
                (HistoryOutcome::Error, survivor.candidate.title.clone())
            }
        };

        match outcome {
            HistoryOutcome::Submitted => counts.submitted += 1,
            HistoryOutcome::Duplicate => counts.duplicates += 1,
            HistoryOutcome::Rejected => counts.rejected += 1,
            HistoryOutcome::Error => counts.errors += 1,
        }

        let recorded = {
            let mut storage = self.storage.lock().unwrap();
            storage.record_history(source.id, url, outcome, title.as_deref())
        };
        if let Err(e) = recorded {
            warn!(url = %url, error = %e, "Failed to record history entry");
        }
    }

    async fn fetch_extract_submit(
        &self,
        source: &SourceRecord,
        survivor: &Survivor,
    ) -> crate::Result<(HistoryOutcome, Option<String>)> {
        let url = url::Url::parse(&survivor.normalized)?;
        let page = self.fetcher.fetch(&url).await?;

        let mut metadata = extract::extract(&page.body, &page.final_url);
        seed_inline_metadata(&mut metadata, &survivor.candidate);
        let title = metadata.title.as_ref().map(|t| t.value.clone());

        let outcome = match self
            .intake
            .submit(&survivor.normalized, &metadata, source)
            .await?
        {
            SubmitOutcome::Accepted => HistoryOutcome::Submitted,
            SubmitOutcome::AlreadyExists => HistoryOutcome::Duplicate,
            SubmitOutcome::Rejected => HistoryOutcome::Rejected,
        };

        Ok((outcome, title))
    }

    /// Finalizes the job row, reschedules the source, and updates stats
    fn finalize(
        &self,
        job_id: i64,
        source: &SourceRecord,
        status: JobStatus,
        counts: JobCounts,
        error_message: Option<&str>,
        started_at: DateTime<Utc>,
    ) -> crate::Result<()> {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        let next = self.next_crawl_time(source, status, finished_at.max(started_at));

        let mut storage = self.storage.lock().unwrap();
        storage.finish_job(job_id, status, counts, error_message)?;
        storage.set_next_crawl(source.id, next)?;
        storage.apply_job_stats(source.id, status, counts, duration_ms, finished_at)?;
        Ok(())
    }

    /// Computes when the source is next due
    ///
    /// Failures use the optional retry backoff; otherwise the source's
    /// normal frequency applies. Optional jitter spreads sources that
    /// would otherwise all come due on the same tick.
    fn next_crawl_time(
        &self,
        source: &SourceRecord,
        status: JobStatus,
        from: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let hours = match status {
            JobStatus::Failed => self
                .config
                .retry_backoff_hours
                .unwrap_or(source.crawl_frequency_hours),
            _ => source.crawl_frequency_hours,
        };

        let mut next = from + ChronoDuration::hours(i64::from(hours.max(1)));
        if self.config.next_crawl_jitter_secs > 0 {
            let jitter = rand::rng().random_range(0..=self.config.next_crawl_jitter_secs);
            next += ChronoDuration::seconds(jitter as i64);
        }
        next
    }
}

/// Cutoff instant for the recency window; None disables filtering
fn recency_cutoff(window_days: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (window_days > 0).then(|| now - ChronoDuration::days(i64::from(window_days)))
}

/// Fills extractor gaps with metadata the source parser supplied inline
///
/// Inline values win only when the page itself yielded nothing.
fn seed_inline_metadata(metadata: &mut crate::ExtractedMetadata, candidate: &Candidate) {
    if metadata.title.is_none() {
        if let Some(title) = &candidate.title {
            metadata.title = Some(Sourced::new(title.clone(), "feed"));
        }
    }
    if metadata.description.is_none() {
        if let Some(summary) = &candidate.summary {
            metadata.description = Some(Sourced::new(summary.clone(), "feed"));
        }
    }
    if metadata.published_at.is_none() {
        if let Some(published) = candidate.published {
            metadata.published_at = Some(Sourced::new(published, "feed"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractedMetadata;
    use url::Url;

    #[test]
    fn test_recency_cutoff_disabled_at_zero() {
        assert!(recency_cutoff(0, Utc::now()).is_none());
    }

    #[test]
    fn test_recency_cutoff_window() {
        let now = Utc::now();
        let cutoff = recency_cutoff(7, now).unwrap();
        assert_eq!((now - cutoff).num_days(), 7);
    }

    #[test]
    fn test_inline_metadata_fills_gaps_only() {
        let mut metadata = ExtractedMetadata {
            title: Some(Sourced::new("Page Title".to_string(), "h1")),
            ..Default::default()
        };
        let candidate = Candidate {
            url: Url::parse("https://x.example/post").unwrap(),
            title: Some("Feed Title".to_string()),
            summary: Some("Feed summary".to_string()),
            published: Some(Utc::now()),
        };

        seed_inline_metadata(&mut metadata, &candidate);

        // Extracted title wins; the feed fills the empty fields
        assert_eq!(metadata.title.unwrap().value, "Page Title");
        assert_eq!(metadata.description.as_ref().unwrap().tier, "feed");
        assert_eq!(metadata.published_at.as_ref().unwrap().tier, "feed");
    }
}
