//! RSS/Atom feed parsing
//!
//! Feeds are parsed with feed-rs, which handles both RSS 2.0 and Atom. For
//! ordinary feeds the candidate is the entry's alternate link. Aggregator
//! feeds (link aggregators whose entries point back at their own discussion
//! pages) are handled specially: the first external link embedded in the
//! entry body is the real candidate, and the aggregator's own domain is
//! excluded entirely so the crawler never re-discovers the aggregator.

use crate::sources::{Candidate, ParseError};
use crate::urlnorm::extract_domain;
use scraper::{Html, Selector};
use url::Url;

/// Parses feed content into candidates
///
/// # Arguments
///
/// * `body` - Raw feed bytes as text
/// * `feed_url` - The URL the feed was fetched from (for relative links)
/// * `aggregator` - Whether this source is a link aggregator
///
/// # Returns
///
/// * `Ok(Vec<Candidate>)` - One candidate per usable entry
/// * `Err(ParseError::Feed)` - The document is not a parseable feed
pub fn parse_feed(
    body: &str,
    feed_url: &Url,
    aggregator: bool,
) -> Result<Vec<Candidate>, ParseError> {
    let feed = feed_rs::parser::parse(body.as_bytes()).map_err(|e| ParseError::Feed {
        url: feed_url.to_string(),
        message: e.to_string(),
    })?;

    let feed_domain = extract_domain(feed_url);
    let mut candidates = Vec::new();

    for entry in &feed.entries {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty());

        let summary = entry
            .summary
            .as_ref()
            .map(|s| s.content.trim().to_string())
            .filter(|s| !s.is_empty());

        let published = entry.published.or(entry.updated);

        let link = if aggregator {
            select_external_link(entry, feed_url, feed_domain.as_deref())
        } else {
            select_entry_link(entry, feed_url)
        };

        let Some(url) = link else {
            tracing::debug!(
                "Feed entry without usable link skipped (feed: {})",
                feed_url
            );
            continue;
        };

        // Never propose the aggregator's own pages as content
        if aggregator {
            if let (Some(feed_domain), Some(candidate_domain)) =
                (feed_domain.as_deref(), extract_domain(&url))
            {
                if candidate_domain == feed_domain {
                    continue;
                }
            }
        }

        candidates.push(Candidate {
            url,
            title,
            summary,
            published,
        });
    }

    Ok(candidates)
}

/// Selects the canonical link of a feed entry
///
/// Prefers links with no `rel` or `rel="alternate"`, then any non-empty
/// link, then the entry id when it happens to be an HTTP URL.
fn select_entry_link(entry: &feed_rs::model::Entry, feed_url: &Url) -> Option<Url> {
    for link in &entry.links {
        let href = link.href.trim();
        if href.is_empty() {
            continue;
        }
        let rel = link.rel.as_deref().unwrap_or("");
        if rel.is_empty() || rel.eq_ignore_ascii_case("alternate") {
            return resolve(href, feed_url);
        }
    }

    if let Some(link) = entry.links.iter().find(|l| !l.href.trim().is_empty()) {
        return resolve(link.href.trim(), feed_url);
    }

    let id = entry.id.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        return resolve(id, feed_url);
    }

    None
}

/// Finds the first external link inside an aggregator entry's body
///
/// Scans the entry content, then the summary, for `<a href>` values whose
/// domain differs from the aggregator's own. Falls back to the entry link
/// when it already points off-site (some aggregators do put the external
/// URL in the entry link itself).
fn select_external_link(
    entry: &feed_rs::model::Entry,
    feed_url: &Url,
    feed_domain: Option<&str>,
) -> Option<Url> {
    if let Some(url) = select_entry_link(entry, feed_url) {
        if let (Some(feed_domain), Some(domain)) = (feed_domain, extract_domain(&url)) {
            if domain != feed_domain {
                return Some(url);
            }
        }
    }

    let html_bodies = [
        entry.content.as_ref().and_then(|c| c.body.as_deref()),
        entry.summary.as_ref().map(|s| s.content.as_str()),
    ];

    for body in html_bodies.into_iter().flatten() {
        if let Some(url) = first_external_anchor(body, feed_url, feed_domain) {
            return Some(url);
        }
    }

    None
}

/// Extracts the first off-site anchor href from an HTML fragment
fn first_external_anchor(html: &str, feed_url: &Url, feed_domain: Option<&str>) -> Option<Url> {
    let fragment = Html::parse_fragment(html);
    let selector = Selector::parse("a[href]").ok()?;

    for element in fragment.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve(href, feed_url) else {
            continue;
        };
        match (feed_domain, extract_domain(&url)) {
            (Some(feed_domain), Some(domain)) if domain != feed_domain => return Some(url),
            (None, Some(_)) => return Some(url),
            _ => continue,
        }
    }

    None
}

/// Resolves a possibly-relative href against the feed URL
fn resolve(href: &str, base: &Url) -> Option<Url> {
    if href.starts_with("javascript:") || href.starts_with("mailto:") || href.starts_with("data:") {
        return None;
    }
    base.join(href).ok().filter(|u| {
        u.scheme() == "http" || u.scheme() == "https"
    })
}
