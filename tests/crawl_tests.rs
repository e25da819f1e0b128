//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and tempfile
//! databases to exercise the full crawl cycle end-to-end.

use async_trait::async_trait;
use chrono::Utc;
use forager::config::{CrawlerConfig, UserAgentConfig};
use forager::crawler::{Executor, Scheduler};
use forager::extract::ExtractedMetadata;
use forager::fetch::{build_http_client, Fetcher, RateLimiter};
use forager::robots::RobotsCache;
use forager::sources::SourceKind;
use forager::storage::{SqliteStorage, Storage};
use forager::submit::{HttpIntake, Intake, LogIntake, SubmitOutcome, SubmitResult};
use forager::{HistoryOutcome, JobStatus, SourceRecord};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn test_crawler_config() -> CrawlerConfig {
    CrawlerConfig {
        tick_interval_secs: 900,
        max_concurrent_jobs: 5,
        default_crawl_delay_ms: 10, // Very short for testing
        request_timeout_secs: 2,
        recency_window_days: 0,
        retry_backoff_hours: None,
        next_crawl_jitter_secs: 0,
    }
}

/// A harness holding the wired pipeline and its temp database
struct Harness {
    storage: Arc<Mutex<SqliteStorage>>,
    executor: Executor,
    _dir: TempDir,
}

fn build_harness(config: CrawlerConfig, intake: Arc<dyn Intake>) -> Harness {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("forager-test.db");
    let storage = SqliteStorage::new(&db_path).expect("Failed to open DB");
    let storage = Arc::new(Mutex::new(storage));

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let user_agent = test_user_agent();
    let client = build_http_client(&user_agent, timeout).expect("Failed to build client");

    let robots = Arc::new(RobotsCache::new(
        client.clone(),
        user_agent.user_agent_string(),
    ));
    let limiter = Arc::new(RateLimiter::new());
    let fetcher = Arc::new(Fetcher::new(client, robots, limiter, &config));

    let executor = Executor::new(Arc::clone(&storage), fetcher, intake, config);

    Harness {
        storage,
        executor,
        _dir: dir,
    }
}

fn seed_source(harness: &Harness, name: &str, kind: SourceKind, url: &str) -> SourceRecord {
    let record = SourceRecord {
        id: 0,
        name: name.to_string(),
        kind,
        url: url.to_string(),
        crawl_frequency_hours: 6,
        topics: vec!["testing".to_string()],
        enabled: true,
        aggregator: false,
        allow_external: false,
        next_crawl_at: None,
    };
    let mut storage = harness.storage.lock().unwrap();
    let id = storage.upsert_source(&record).expect("Failed to seed source");
    storage.get_source(id).expect("Failed to load source")
}

/// Intake implementation that records every submission it sees
#[derive(Default)]
struct RecordingIntake {
    submissions: Mutex<Vec<(String, ExtractedMetadata)>>,
}

#[async_trait]
impl Intake for RecordingIntake {
    async fn submit(
        &self,
        url: &str,
        metadata: &ExtractedMetadata,
        _source: &SourceRecord,
    ) -> SubmitResult {
        self.submissions
            .lock()
            .unwrap()
            .push((url.to_string(), metadata.clone()));
        Ok(SubmitOutcome::Accepted)
    }
}

fn rss_feed(base_url: &str, slugs: &[&str]) -> String {
    let items: String = slugs
        .iter()
        .map(|slug| {
            format!(
                "<item><title>Post {slug}</title>\
                 <link>{base_url}/{slug}</link>\
                 <pubDate>Mon, 05 Jan 2026 10:00:00 GMT</pubDate></item>"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel>\
         <title>Test Feed</title><link>{base_url}</link>{items}</channel></rss>"
    )
}

fn article_html(title: &str) -> String {
    format!(
        "<html><head><title>{title}</title>\
         <meta property=\"og:description\" content=\"About {title}\"></head>\
         <body><h1>{title}</h1><p>Body of {title}.</p></body></html>"
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_rss_job_counts_new_and_duplicate() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/feed.xml",
        rss_feed(&base, &["post-1", "post-2", "post-3", "post-4", "post-5"]),
    )
    .await;
    for slug in ["post-1", "post-2", "post-3", "post-4", "post-5"] {
        mount_page(&server, &format!("/{slug}"), article_html(slug)).await;
    }

    let harness = build_harness(test_crawler_config(), Arc::new(LogIntake));
    let source = seed_source(
        &harness,
        "feed",
        SourceKind::Rss,
        &format!("{base}/feed.xml"),
    );

    // Two of the five entries are already in history
    {
        let mut storage = harness.storage.lock().unwrap();
        for slug in ["post-4", "post-5"] {
            storage
                .record_history(
                    source.id,
                    &format!("{base}/{slug}"),
                    HistoryOutcome::Submitted,
                    None,
                )
                .unwrap();
        }
    }

    let started = Utc::now();
    let status = harness.executor.run_job(&source).await.unwrap();
    assert_eq!(status, JobStatus::Completed);

    let storage = harness.storage.lock().unwrap();
    let job = storage.get_job(1).unwrap();
    assert_eq!(job.counts.candidates_found, 5);
    assert_eq!(job.counts.submitted, 3);
    assert_eq!(job.counts.duplicates, 2);
    assert_eq!(job.counts.errors, 0);

    // The source is rescheduled strictly after the job started
    let source = storage.get_source(source.id).unwrap();
    assert!(source.next_crawl_at.unwrap() > started);
}

#[tokio::test]
async fn test_second_run_over_unchanged_feed_submits_nothing() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/feed.xml", rss_feed(&base, &["a", "b", "c"])).await;
    for slug in ["a", "b", "c"] {
        mount_page(&server, &format!("/{slug}"), article_html(slug)).await;
    }

    let harness = build_harness(test_crawler_config(), Arc::new(LogIntake));
    let source = seed_source(
        &harness,
        "feed",
        SourceKind::Rss,
        &format!("{base}/feed.xml"),
    );

    harness.executor.run_job(&source).await.unwrap();
    harness.executor.run_job(&source).await.unwrap();

    let storage = harness.storage.lock().unwrap();
    let second = storage.get_job(2).unwrap();
    assert_eq!(second.counts.submitted, 0);
    assert_eq!(second.counts.duplicates, 3);

    // History holds one row per URL regardless of how often it is seen
    assert_eq!(storage.history_count(source.id).unwrap(), 3);
}

#[tokio::test]
async fn test_malformed_sitemap_fails_job_and_reschedules() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/sitemap.xml", "this is not a sitemap".to_string()).await;

    let harness = build_harness(test_crawler_config(), Arc::new(LogIntake));
    let source = seed_source(
        &harness,
        "broken-map",
        SourceKind::Sitemap,
        &format!("{base}/sitemap.xml"),
    );

    let status = harness.executor.run_job(&source).await.unwrap();
    assert_eq!(status, JobStatus::Failed);

    let storage = harness.storage.lock().unwrap();
    let job = storage.get_job(1).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.is_some());

    // No candidates were processed
    assert_eq!(storage.history_count(source.id).unwrap(), 0);

    // The broken source cannot wedge the scheduler
    let source = storage.get_source(source.id).unwrap();
    assert!(source.next_crawl_at.is_some());
}

#[tokio::test]
async fn test_candidate_timeout_is_an_error_not_a_job_failure() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/feed.xml", rss_feed(&base, &["fast", "slow"])).await;
    mount_page(&server, "/fast", article_html("fast")).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_html("slow"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let harness = build_harness(test_crawler_config(), Arc::new(LogIntake));
    let source = seed_source(
        &harness,
        "feed",
        SourceKind::Rss,
        &format!("{base}/feed.xml"),
    );

    let status = harness.executor.run_job(&source).await.unwrap();
    assert_eq!(status, JobStatus::Completed);

    let storage = harness.storage.lock().unwrap();
    let job = storage.get_job(1).unwrap();
    assert_eq!(job.counts.submitted, 1);
    assert_eq!(job.counts.errors, 1);

    // Both candidates got exactly one history entry
    assert_eq!(storage.history_count(source.id).unwrap(), 2);
}

#[tokio::test]
async fn test_robots_disallowed_url_never_fetched() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /secret"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/feed.xml", rss_feed(&base, &["secret/post"])).await;

    // The disallowed page must receive zero requests
    Mock::given(method("GET"))
        .and(path("/secret/post"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_html("secret")))
        .expect(0)
        .mount(&server)
        .await;

    let harness = build_harness(test_crawler_config(), Arc::new(LogIntake));
    let source = seed_source(
        &harness,
        "feed",
        SourceKind::Rss,
        &format!("{base}/feed.xml"),
    );

    harness.executor.run_job(&source).await.unwrap();

    let storage = harness.storage.lock().unwrap();
    let job = storage.get_job(1).unwrap();
    assert_eq!(job.counts.submitted, 0);
    assert_eq!(job.counts.errors, 1);

    // Mock expectations (zero hits on /secret/post) verify on drop
}

#[tokio::test]
async fn test_requests_to_one_domain_are_spaced() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/feed.xml", rss_feed(&base, &["one", "two", "three"])).await;
    for slug in ["one", "two", "three"] {
        mount_page(&server, &format!("/{slug}"), article_html(slug)).await;
    }

    let mut config = test_crawler_config();
    config.default_crawl_delay_ms = 300;

    let harness = build_harness(config, Arc::new(LogIntake));
    let source = seed_source(
        &harness,
        "feed",
        SourceKind::Rss,
        &format!("{base}/feed.xml"),
    );

    let start = Instant::now();
    harness.executor.run_job(&source).await.unwrap();
    let elapsed = start.elapsed();

    // Four GETs to one domain (feed + three articles) with a 300ms gap
    // between consecutive requests
    assert!(
        elapsed >= Duration::from_millis(800),
        "Requests were not rate limited: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_extraction_falls_back_to_twitter_title() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/feed.xml", rss_feed(&base, &["bare"])).await;
    mount_page(
        &server,
        "/bare",
        "<html><head>\
         <meta name=\"twitter:title\" content=\"Card Title\">\
         </head><body><p>no headline markup here</p></body></html>"
            .to_string(),
    )
    .await;

    let intake = Arc::new(RecordingIntake::default());
    let harness = build_harness(test_crawler_config(), intake.clone());
    let source = seed_source(
        &harness,
        "feed",
        SourceKind::Rss,
        &format!("{base}/feed.xml"),
    );

    harness.executor.run_job(&source).await.unwrap();

    let submissions = intake.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    let metadata = &submissions[0].1;
    let title = metadata.title.as_ref().unwrap();
    assert_eq!(title.value, "Card Title");
    assert_eq!(title.tier, "twitter:title");
}

#[tokio::test]
async fn test_http_intake_conflict_counts_as_duplicate() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/feed.xml", rss_feed(&base, &["known"])).await;
    mount_page(&server, "/known", article_html("known")).await;
    Mock::given(method("POST"))
        .and(path("/intake/items"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let intake = HttpIntake::new(
        format!("{base}/intake/items"),
        Some("test-key".to_string()),
        "TestBot/1.0.0",
        Duration::from_secs(2),
    )
    .expect("Failed to build intake");

    let harness = build_harness(test_crawler_config(), Arc::new(intake));
    let source = seed_source(
        &harness,
        "feed",
        SourceKind::Rss,
        &format!("{base}/feed.xml"),
    );

    harness.executor.run_job(&source).await.unwrap();

    let storage = harness.storage.lock().unwrap();
    let job = storage.get_job(1).unwrap();
    assert_eq!(job.counts.submitted, 0);
    assert_eq!(job.counts.duplicates, 1);
}

#[tokio::test]
async fn test_sitemap_source_with_nested_index() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/sitemap.xml",
        format!(
            "<?xml version=\"1.0\"?>\
             <sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\
             <sitemap><loc>{base}/sitemap-posts.xml</loc></sitemap>\
             </sitemapindex>"
        ),
    )
    .await;
    mount_page(
        &server,
        "/sitemap-posts.xml",
        format!(
            "<?xml version=\"1.0\"?>\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\
             <url><loc>{base}/posts/alpha</loc><lastmod>2026-01-05</lastmod></url>\
             <url><loc>{base}/posts/beta</loc></url>\
             </urlset>"
        ),
    )
    .await;
    mount_page(&server, "/posts/alpha", article_html("alpha")).await;
    mount_page(&server, "/posts/beta", article_html("beta")).await;

    let harness = build_harness(test_crawler_config(), Arc::new(LogIntake));
    let source = seed_source(
        &harness,
        "site",
        SourceKind::Sitemap,
        &format!("{base}/sitemap.xml"),
    );

    let status = harness.executor.run_job(&source).await.unwrap();
    assert_eq!(status, JobStatus::Completed);

    let storage = harness.storage.lock().unwrap();
    let job = storage.get_job(1).unwrap();
    assert_eq!(job.counts.candidates_found, 2);
    assert_eq!(job.counts.submitted, 2);
}

#[tokio::test]
async fn test_web_source_stays_on_site() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        format!(
            "<html><body>\
             <a href=\"{base}/local\">local</a>\
             <a href=\"https://elsewhere.example.com/offsite\">offsite</a>\
             </body></html>"
        ),
    )
    .await;
    mount_page(&server, "/local", article_html("local")).await;

    let harness = build_harness(test_crawler_config(), Arc::new(LogIntake));
    let source = seed_source(&harness, "site", SourceKind::Web, &format!("{base}/"));

    harness.executor.run_job(&source).await.unwrap();

    let storage = harness.storage.lock().unwrap();
    let job = storage.get_job(1).unwrap();
    // The off-site link never becomes a candidate
    assert_eq!(job.counts.candidates_found, 1);
    assert_eq!(job.counts.submitted, 1);
}

#[tokio::test]
async fn test_rate_limit_spans_concurrent_jobs() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/feed-a.xml", rss_feed(&base, &["a-post"])).await;
    mount_page(&server, "/feed-b.xml", rss_feed(&base, &["b-post"])).await;
    mount_page(&server, "/a-post", article_html("a-post")).await;
    mount_page(&server, "/b-post", article_html("b-post")).await;

    let mut config = test_crawler_config();
    config.default_crawl_delay_ms = 300;

    let harness = build_harness(config, Arc::new(LogIntake));
    let a = seed_source(&harness, "a", SourceKind::Rss, &format!("{base}/feed-a.xml"));
    let b = seed_source(&harness, "b", SourceKind::Rss, &format!("{base}/feed-b.xml"));

    let start = Instant::now();
    let (first, second) = tokio::join!(
        harness.executor.run_job(&a),
        harness.executor.run_job(&b)
    );
    let elapsed = start.elapsed();

    assert_eq!(first.unwrap(), JobStatus::Completed);
    assert_eq!(second.unwrap(), JobStatus::Completed);

    // Four GETs to one domain (two feeds + two articles) across two jobs
    // with a 300ms gap between consecutive requests
    assert!(
        elapsed >= Duration::from_millis(800),
        "Requests from concurrent jobs were not spaced: {:?}",
        elapsed
    );

    let storage = harness.storage.lock().unwrap();
    assert_eq!(storage.get_job(1).unwrap().counts.submitted, 1);
    assert_eq!(storage.get_job(2).unwrap().counts.submitted, 1);
}

#[tokio::test]
async fn test_trigger_skips_source_already_running() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss_feed(&base, &["slow"]))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/slow", article_html("slow")).await;

    let harness = build_harness(test_crawler_config(), Arc::new(LogIntake));
    let source = seed_source(
        &harness,
        "feed",
        SourceKind::Rss,
        &format!("{base}/feed.xml"),
    );

    let scheduler = Scheduler::new(
        Arc::clone(&harness.storage),
        Arc::new(harness.executor),
        Duration::from_secs(900),
        5,
    );

    let (first, second) = tokio::join!(
        scheduler.trigger(source.id),
        scheduler.trigger(source.id)
    );
    first.unwrap();
    second.unwrap();

    // Only one job ran; the concurrent trigger was skipped
    let storage = harness.storage.lock().unwrap();
    assert_eq!(storage.recent_jobs(10).unwrap().len(), 1);

    // The marker was released, so a later trigger runs again
    drop(storage);
    scheduler.trigger(source.id).await.unwrap();
    let storage = harness.storage.lock().unwrap();
    assert_eq!(storage.recent_jobs(10).unwrap().len(), 2);
}
