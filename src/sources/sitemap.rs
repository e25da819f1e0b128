//! XML sitemap parsing
//!
//! Supports both `<urlset>` documents and `<sitemapindex>` documents; the
//! caller decides how deep to follow an index. Parsing is event-driven via
//! quick-xml so large sitemaps never need a DOM.

use crate::sources::{Candidate, ParseError};
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use url::Url;

/// One `<url>` entry of a urlset sitemap
#[derive(Debug, Clone)]
pub struct SitemapEntry {
    /// The page URL from `<loc>`
    pub loc: Url,

    /// Last modification time from `<lastmod>`, if present
    pub lastmod: Option<DateTime<Utc>>,
}

impl SitemapEntry {
    /// Converts the entry into a crawl candidate, carrying lastmod as the
    /// inline published date
    pub fn into_candidate(self) -> Candidate {
        Candidate {
            url: self.loc,
            title: None,
            summary: None,
            published: self.lastmod,
        }
    }
}

/// A parsed sitemap document
#[derive(Debug)]
pub enum Sitemap {
    /// A urlset: the entries are page URLs
    UrlSet(Vec<SitemapEntry>),

    /// A sitemap index: the entries are URLs of child sitemaps
    Index(Vec<Url>),
}

/// Parses a sitemap XML document
///
/// # Arguments
///
/// * `body` - The XML content
/// * `base_url` - The sitemap's own URL, used to resolve relative locs and
///   for error messages
///
/// # Returns
///
/// * `Ok(Sitemap)` - A urlset or index
/// * `Err(ParseError::Sitemap)` - Malformed XML or an unrecognized root
pub fn parse_sitemap(body: &str, base_url: &Url) -> Result<Sitemap, ParseError> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let sitemap_err = |message: String| ParseError::Sitemap {
        url: base_url.to_string(),
        message,
    };

    let mut root: Option<Root> = None;
    let mut in_loc = false;
    let mut in_lastmod = false;
    let mut current_loc: Option<String> = None;
    let mut current_lastmod: Option<String> = None;
    let mut entries: Vec<SitemapEntry> = Vec::new();
    let mut children: Vec<Url> = Vec::new();

    loop {
        match reader.read_event() {
            Err(e) => return Err(sitemap_err(format!("XML error: {}", e))),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"urlset" => root = Some(Root::UrlSet),
                b"sitemapindex" => root = Some(Root::Index),
                b"url" | b"sitemap" => {
                    current_loc = None;
                    current_lastmod = None;
                }
                b"loc" => in_loc = true,
                b"lastmod" => in_lastmod = true,
                _ => {}
            },
            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|e| sitemap_err(format!("XML error: {}", e)))?;
                if in_loc {
                    current_loc = Some(value.trim().to_string());
                } else if in_lastmod {
                    current_lastmod = Some(value.trim().to_string());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"loc" => in_loc = false,
                b"lastmod" => in_lastmod = false,
                b"url" | b"sitemap" => {
                    let Some(loc) = current_loc.take() else {
                        continue;
                    };
                    let Ok(loc) = base_url.join(&loc) else {
                        tracing::debug!("Skipping unparseable sitemap loc: {}", loc);
                        continue;
                    };
                    match root {
                        Some(Root::UrlSet) => entries.push(SitemapEntry {
                            loc,
                            lastmod: current_lastmod.take().and_then(|s| parse_lastmod(&s)),
                        }),
                        Some(Root::Index) => children.push(loc),
                        None => {}
                    }
                }
                _ => {}
            },
            Ok(_) => {}
        }
    }

    match root {
        Some(Root::UrlSet) => Ok(Sitemap::UrlSet(entries)),
        Some(Root::Index) => Ok(Sitemap::Index(children)),
        None => Err(sitemap_err(
            "document has no <urlset> or <sitemapindex> root".to_string(),
        )),
    }
}

#[derive(Clone, Copy)]
enum Root {
    UrlSet,
    Index,
}

/// Parses a `<lastmod>` value
///
/// The sitemap protocol allows both full W3C datetimes and bare dates.
fn parse_lastmod(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}
