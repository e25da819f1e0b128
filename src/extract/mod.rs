//! Metadata extraction
//!
//! Each metadata field is resolved independently through an ordered chain
//! of fallback tiers; the first tier yielding a non-empty value wins. No
//! field blocks another, and extraction never fails: a page lacking every
//! tier for every field still produces a (mostly empty) record.

mod fields;

use chrono::{DateTime, Utc};
use scraper::Html;
use url::Url;

/// A field value together with the fallback tier that produced it
///
/// The tier label is kept for observability; it is logged when a record is
/// assembled and surfaces in debugging which extraction path fired.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub tier: &'static str,
}

impl<T> Sourced<T> {
    pub fn new(value: T, tier: &'static str) -> Self {
        Self { value, tier }
    }
}

/// Normalized metadata extracted from one fetched page
#[derive(Debug, Clone, Default)]
pub struct ExtractedMetadata {
    pub title: Option<Sourced<String>>,
    pub description: Option<Sourced<String>>,
    pub image_url: Option<Sourced<String>>,
    pub author: Option<Sourced<String>>,
    pub published_at: Option<Sourced<DateTime<Utc>>>,
    pub body_excerpt: Option<Sourced<String>>,
    pub topics: Option<Sourced<Vec<String>>>,
}

impl ExtractedMetadata {
    /// True when no field produced a value
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.author.is_none()
            && self.published_at.is_none()
            && self.body_excerpt.is_none()
            && self.topics.is_none()
    }
}

/// Extracts metadata from a fetched page
///
/// Runs every field's fallback chain over a single parsed document. This
/// cannot fail; the worst case is an empty record.
///
/// # Arguments
///
/// * `body` - The page HTML
/// * `page_url` - The page URL (for resolving image links and the URL-path
///   topic tier)
pub fn extract(body: &str, page_url: &Url) -> ExtractedMetadata {
    let document = Html::parse_document(body);

    let metadata = ExtractedMetadata {
        title: fields::title(&document),
        description: fields::description(&document),
        image_url: fields::image(&document, page_url),
        author: fields::author(&document),
        published_at: fields::published(&document),
        body_excerpt: fields::body_excerpt(&document),
        topics: None,
    };

    // The topics chain may fall back to keyword analysis of the excerpt
    let topics = fields::topics(&document, page_url, &metadata.body_excerpt);

    let metadata = ExtractedMetadata { topics, ..metadata };

    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!(
            "Extracted {}: title={:?} description={:?} image={:?} author={:?} published={:?} excerpt={:?} topics={:?}",
            page_url,
            metadata.title.as_ref().map(|s| s.tier),
            metadata.description.as_ref().map(|s| s.tier),
            metadata.image_url.as_ref().map(|s| s.tier),
            metadata.author.as_ref().map(|s| s.tier),
            metadata.published_at.as_ref().map(|s| s.tier),
            metadata.body_excerpt.as_ref().map(|s| s.tier),
            metadata.topics.as_ref().map(|s| s.tier),
        );
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://news.example.com/tech/ai/new-model").unwrap()
    }

    #[test]
    fn test_empty_page_yields_empty_record() {
        let metadata = extract("<html><body></body></html>", &page_url());
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_rich_page_fills_all_fields() {
        let body = r#"<html><head>
            <title>Tab Title</title>
            <meta property="og:title" content="OG Title">
            <meta property="og:description" content="OG description text.">
            <meta property="og:image" content="https://cdn.example.com/hero.jpg">
            <meta name="author" content="Jordan Smith">
            <meta property="article:published_time" content="2025-01-06T10:00:00Z">
            <meta name="keywords" content="ai, models">
            </head><body>
            <h1>Headline Title</h1>
            <article><p>The first substantial paragraph of the article body, long enough to count as real content for the excerpt.</p></article>
            </body></html>"#;

        let metadata = extract(body, &page_url());

        // h1 outranks og:title
        let title = metadata.title.unwrap();
        assert_eq!(title.value, "Headline Title");
        assert_eq!(title.tier, "h1");

        assert_eq!(metadata.description.unwrap().tier, "og:description");
        assert_eq!(
            metadata.image_url.unwrap().value,
            "https://cdn.example.com/hero.jpg"
        );
        assert_eq!(metadata.author.unwrap().value, "Jordan Smith");
        assert!(metadata.published_at.is_some());
        assert!(metadata.body_excerpt.is_some());
        assert_eq!(metadata.topics.unwrap().value, vec!["ai", "models"]);
    }

    #[test]
    fn test_twitter_title_fallback() {
        // Only a twitter:title is present: no h1, no og:title, no <title>
        let body = r#"<html><head>
            <meta name="twitter:title" content="Twitter Card Title">
            </head><body><p>x</p></body></html>"#;

        let metadata = extract(body, &page_url());
        let title = metadata.title.unwrap();
        assert_eq!(title.value, "Twitter Card Title");
        assert_eq!(title.tier, "twitter:title");
    }

    #[test]
    fn test_fields_independent() {
        // A page with only an author still extracts it; nothing else blocks
        let body = r#"<html><head><meta name="author" content="Sam Lee"></head>
            <body></body></html>"#;
        let metadata = extract(body, &page_url());
        assert_eq!(metadata.author.unwrap().value, "Sam Lee");
        assert!(metadata.title.is_none());
        assert!(metadata.description.is_none());
    }
}
