//! Source parsers
//!
//! A source is polymorphic over its kind: RSS/Atom feed, XML sitemap, or a
//! plain web page. Each kind has one parser that turns the fetched source
//! document into candidate URLs plus whatever inline metadata the format
//! carries. A malformed source document is a [`ParseError`], which fails
//! the whole crawl job since no candidates could be derived at all.

mod rss;
mod sitemap;
mod web;

pub use rss::parse_feed;
pub use sitemap::{parse_sitemap, Sitemap, SitemapEntry};
pub use web::parse_links;

use crate::fetch::{FetchError, Fetcher};
use crate::storage::SourceRecord;
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

/// The kind of a registered source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// RSS or Atom feed
    Rss,
    /// XML sitemap (urlset or one level of sitemapindex)
    Sitemap,
    /// Plain web page; candidates are its outbound links
    Web,
}

impl SourceKind {
    /// Database string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::Sitemap => "sitemap",
            Self::Web => "web",
        }
    }

    /// Parses the database string form
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "rss" => Some(Self::Rss),
            "sitemap" => Some(Self::Sitemap),
            "web" => Some(Self::Web),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL discovered by a source parser, not yet confirmed new or processed
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The candidate URL (not yet normalized)
    pub url: Url,

    /// Inline title from the source document, if any
    pub title: Option<String>,

    /// Inline summary/description from the source document, if any
    pub summary: Option<String>,

    /// Inline published date, if the source document carries one
    pub published: Option<DateTime<Utc>>,
}

impl Candidate {
    /// Creates a candidate with no inline metadata
    pub fn bare(url: Url) -> Self {
        Self {
            url,
            title: None,
            summary: None,
            published: None,
        }
    }
}

/// Errors raised while deriving candidates from a source
///
/// Any of these fails the whole job: there is nothing to iterate.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Source unreachable: {0}")]
    SourceFetch(#[from] FetchError),

    #[error("Invalid source URL {url}: {message}")]
    SourceUrl { url: String, message: String },

    #[error("Malformed feed at {url}: {message}")]
    Feed { url: String, message: String },

    #[error("Malformed sitemap at {url}: {message}")]
    Sitemap { url: String, message: String },

    #[error("Unparseable page at {url}: {message}")]
    Html { url: String, message: String },
}

/// How many child sitemaps of a sitemap index are followed
const MAX_CHILD_SITEMAPS: usize = 50;

/// Fetches a source document and derives its candidate URLs
///
/// Dispatches on the source kind. For sitemap indexes, child sitemaps are
/// fetched through the same politeness-aware fetcher, one level deep; a
/// child that fails to fetch or parse is skipped with a warning rather
/// than failing the job, since the index itself was readable.
///
/// # Arguments
///
/// * `fetcher` - The shared fetcher (robots + rate limits apply)
/// * `source` - The source being crawled
///
/// # Returns
///
/// * `Ok(Vec<Candidate>)` - Candidates in document order
/// * `Err(ParseError)` - The source was unreachable or malformed
pub async fn discover_candidates(
    fetcher: &Fetcher,
    source: &SourceRecord,
) -> Result<Vec<Candidate>, ParseError> {
    let source_url = Url::parse(&source.url).map_err(|e| ParseError::SourceUrl {
        url: source.url.clone(),
        message: e.to_string(),
    })?;

    let page = fetcher.fetch(&source_url).await?;

    match source.kind {
        SourceKind::Rss => parse_feed(&page.body, &page.final_url, source.aggregator),
        SourceKind::Web => parse_links(
            &page.body,
            &page.final_url,
            &source_url,
            source.allow_external,
        ),
        SourceKind::Sitemap => {
            let mut candidates = Vec::new();
            match parse_sitemap(&page.body, &page.final_url)? {
                Sitemap::UrlSet(entries) => {
                    candidates.extend(entries.into_iter().map(SitemapEntry::into_candidate));
                }
                Sitemap::Index(children) => {
                    for child_url in children.into_iter().take(MAX_CHILD_SITEMAPS) {
                        match fetch_child_sitemap(fetcher, &child_url).await {
                            Ok(entries) => candidates
                                .extend(entries.into_iter().map(SitemapEntry::into_candidate)),
                            Err(e) => {
                                tracing::warn!("Skipping child sitemap {}: {}", child_url, e);
                            }
                        }
                    }
                }
            }
            Ok(candidates)
        }
    }
}

/// Fetches and parses one child sitemap of an index
///
/// Nested indexes below the first level are not followed.
async fn fetch_child_sitemap(
    fetcher: &Fetcher,
    url: &Url,
) -> Result<Vec<SitemapEntry>, ParseError> {
    let page = fetcher.fetch(url).await?;
    match parse_sitemap(&page.body, &page.final_url)? {
        Sitemap::UrlSet(entries) => Ok(entries),
        Sitemap::Index(_) => {
            tracing::debug!("Ignoring nested sitemap index at {}", url);
            Ok(Vec::new())
        }
    }
}
