//! Web page link discovery
//!
//! For a `web` source the root page itself is fetched and its outbound
//! `<a href>` links become the candidates. By default candidates are
//! restricted to the source's registered site; a source can opt out of
//! that restriction.

use crate::sources::{Candidate, ParseError};
use crate::urlnorm::{extract_domain, is_same_site};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Parses a web page and extracts candidate links
///
/// # Link Rules
///
/// - `<a href>` anchors only; stylesheets, scripts, and images are ignored
/// - `javascript:`, `mailto:`, `tel:`, and data URIs are skipped
/// - Relative hrefs resolve against the fetched page URL
/// - The page's own URL is never a candidate
/// - Duplicates are dropped, first occurrence wins
/// - Unless `allow_external` is set, links must share the source's site
///
/// # Arguments
///
/// * `body` - The HTML content
/// * `page_url` - The URL the page was fetched from (base for relatives)
/// * `source_url` - The registered source URL (defines the allowed site)
/// * `allow_external` - Permit links to other sites
///
/// # Returns
///
/// * `Ok(Vec<Candidate>)` - Discovered links in document order
/// * `Err(ParseError::Html)` - The body is empty or carries no markup
pub fn parse_links(
    body: &str,
    page_url: &Url,
    source_url: &Url,
    allow_external: bool,
) -> Result<Vec<Candidate>, ParseError> {
    if body.trim().is_empty() {
        return Err(ParseError::Html {
            url: page_url.to_string(),
            message: "empty document".to_string(),
        });
    }

    let document = Html::parse_document(body);

    let selector = Selector::parse("a[href]").map_err(|e| ParseError::Html {
        url: page_url.to_string(),
        message: format!("selector error: {}", e),
    })?;

    let source_domain = extract_domain(source_url);
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();

        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("data:")
        {
            continue;
        }

        let Ok(mut url) = page_url.join(href) else {
            tracing::debug!("Skipping unparseable href {} on {}", href, page_url);
            continue;
        };
        url.set_fragment(None);

        if url.scheme() != "http" && url.scheme() != "https" {
            continue;
        }

        if url == *page_url || url == *source_url {
            continue;
        }

        if !allow_external {
            let same_site = match (extract_domain(&url), source_domain.as_deref()) {
                (Some(candidate_domain), Some(source_domain)) => {
                    is_same_site(&candidate_domain, source_domain)
                }
                _ => false,
            };
            if !same_site {
                continue;
            }
        }

        if seen.insert(url.to_string()) {
            candidates.push(Candidate::bare(url));
        }
    }

    Ok(candidates)
}
