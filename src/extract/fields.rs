//! Per-field fallback chains
//!
//! Every public function here resolves one metadata field as an ordered
//! list of pure tiers over the parsed document; the first tier returning a
//! non-empty value wins and its label is attached to the result.

use crate::extract::Sourced;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Minimum length for a paragraph to count as "substantial"
const SUBSTANTIAL_PARAGRAPH_CHARS: usize = 80;

/// Maximum length of the body excerpt (characters)
const EXCERPT_MAX_CHARS: usize = 1000;

/// Maximum number of topics kept per page
const MAX_TOPICS: usize = 10;

// ===== Title =====

/// Title chain: h1 → og:title → twitter:title → title → h2 → ld+json headline
pub fn title(doc: &Html) -> Option<Sourced<String>> {
    if let Some(value) = element_text(doc, "h1") {
        return Some(Sourced::new(value, "h1"));
    }
    if let Some(value) = meta_content(doc, r#"meta[property="og:title"]"#) {
        return Some(Sourced::new(value, "og:title"));
    }
    if let Some(value) = twitter_meta(doc, "twitter:title") {
        return Some(Sourced::new(value, "twitter:title"));
    }
    if let Some(value) = element_text(doc, "title") {
        return Some(Sourced::new(value, "title"));
    }
    if let Some(value) = element_text(doc, "h2") {
        return Some(Sourced::new(value, "h2"));
    }
    if let Some(value) = ld_json_string(doc, "headline") {
        return Some(Sourced::new(value, "ld+json headline"));
    }
    None
}

// ===== Description =====

/// Description chain: og:description → twitter:description → meta
/// description → ld+json description → first substantial paragraph
pub fn description(doc: &Html) -> Option<Sourced<String>> {
    if let Some(value) = meta_content(doc, r#"meta[property="og:description"]"#) {
        return Some(Sourced::new(value, "og:description"));
    }
    if let Some(value) = twitter_meta(doc, "twitter:description") {
        return Some(Sourced::new(value, "twitter:description"));
    }
    if let Some(value) = meta_content(doc, r#"meta[name="description"]"#) {
        return Some(Sourced::new(value, "meta description"));
    }
    if let Some(value) = ld_json_string(doc, "description") {
        return Some(Sourced::new(value, "ld+json description"));
    }
    if let Some(value) = first_substantial_paragraph(doc) {
        return Some(Sourced::new(value, "first paragraph"));
    }
    None
}

// ===== Image =====

/// Image chain: og:image → twitter:image → ld+json image → first in-article
/// img → first page img. Relative URLs resolve against the page URL.
pub fn image(doc: &Html, page_url: &Url) -> Option<Sourced<String>> {
    if let Some(value) = meta_content(doc, r#"meta[property="og:image"]"#) {
        if let Some(resolved) = resolve_url(&value, page_url) {
            return Some(Sourced::new(resolved, "og:image"));
        }
    }
    if let Some(value) = twitter_meta(doc, "twitter:image") {
        if let Some(resolved) = resolve_url(&value, page_url) {
            return Some(Sourced::new(resolved, "twitter:image"));
        }
    }
    if let Some(value) = ld_json_string(doc, "image") {
        if let Some(resolved) = resolve_url(&value, page_url) {
            return Some(Sourced::new(resolved, "ld+json image"));
        }
    }
    if let Some(value) = first_attr(doc, "article img[src]", "src") {
        if let Some(resolved) = resolve_url(&value, page_url) {
            return Some(Sourced::new(resolved, "article img"));
        }
    }
    if let Some(value) = first_attr(doc, "img[src]", "src") {
        if let Some(resolved) = resolve_url(&value, page_url) {
            return Some(Sourced::new(resolved, "page img"));
        }
    }
    None
}

// ===== Author =====

/// Author chain: meta author → article:author → ld+json author →
/// rel=author → author-class elements → byline text pattern
pub fn author(doc: &Html) -> Option<Sourced<String>> {
    if let Some(value) = meta_content(doc, r#"meta[name="author"]"#) {
        return Some(Sourced::new(value, "meta author"));
    }
    if let Some(value) = meta_content(doc, r#"meta[property="article:author"]"#) {
        // article:author is sometimes a profile URL rather than a name
        if !value.starts_with("http://") && !value.starts_with("https://") {
            return Some(Sourced::new(value, "article:author"));
        }
    }
    if let Some(value) = ld_json_author(doc) {
        return Some(Sourced::new(value, "ld+json author"));
    }
    if let Some(value) = element_text(doc, r#"a[rel="author"]"#) {
        return Some(Sourced::new(value, "rel=author"));
    }
    if let Some(value) = element_text(doc, ".author, .author-name, .byline-author") {
        let value = value.strip_prefix("By ").unwrap_or(&value).to_string();
        if !value.is_empty() && value.len() <= 100 {
            return Some(Sourced::new(value, "author class"));
        }
    }
    if let Some(value) = byline_scan(doc) {
        return Some(Sourced::new(value, "byline"));
    }
    None
}

// ===== Published date =====

/// Published chain: article:published_time → ld+json datePublished →
/// meta date tags → `<time datetime>`
pub fn published(doc: &Html) -> Option<Sourced<DateTime<Utc>>> {
    if let Some(value) = meta_content(doc, r#"meta[property="article:published_time"]"#) {
        if let Some(date) = parse_date(&value) {
            return Some(Sourced::new(date, "article:published_time"));
        }
    }
    if let Some(value) = ld_json_string(doc, "datePublished") {
        if let Some(date) = parse_date(&value) {
            return Some(Sourced::new(date, "ld+json datePublished"));
        }
    }
    for selector in [
        r#"meta[name="date"]"#,
        r#"meta[name="publish-date"]"#,
        r#"meta[name="publication_date"]"#,
        r#"meta[itemprop="datePublished"]"#,
    ] {
        if let Some(value) = meta_content(doc, selector) {
            if let Some(date) = parse_date(&value) {
                return Some(Sourced::new(date, "meta date"));
            }
        }
    }
    if let Some(value) = first_attr(doc, "time[datetime]", "datetime") {
        if let Some(date) = parse_date(&value) {
            return Some(Sourced::new(date, "time element"));
        }
    }
    None
}

// ===== Body excerpt =====

/// Excerpt chain: article → main → common content containers → all
/// paragraphs concatenated. Each tier must clear a minimum length to fire.
pub fn body_excerpt(doc: &Html) -> Option<Sourced<String>> {
    let tiers: [(&str, &str); 3] = [
        ("article", "article"),
        ("main", "main"),
        (
            ".post-content, .article-content, .entry-content, #content",
            "content selector",
        ),
    ];

    for (selector, tier) in tiers {
        if let Some(text) = container_text(doc, selector) {
            if text.chars().count() >= SUBSTANTIAL_PARAGRAPH_CHARS {
                return Some(Sourced::new(truncate(&text, EXCERPT_MAX_CHARS), tier));
            }
        }
    }

    // Last resort: concatenate every paragraph on the page
    let joined = all_paragraph_text(doc);
    if joined.chars().count() >= SUBSTANTIAL_PARAGRAPH_CHARS {
        return Some(Sourced::new(truncate(&joined, EXCERPT_MAX_CHARS), "paragraphs"));
    }

    None
}

// ===== Topics =====

/// Topics chain: meta keywords → article:tag → ld+json keywords → tag/
/// category markup → URL path segments → keyword analysis of the excerpt
pub fn topics(
    doc: &Html,
    page_url: &Url,
    excerpt: &Option<Sourced<String>>,
) -> Option<Sourced<Vec<String>>> {
    if let Some(value) = meta_content(doc, r#"meta[name="keywords"]"#) {
        let topics = normalize_topics(value.split(','));
        if !topics.is_empty() {
            return Some(Sourced::new(topics, "meta keywords"));
        }
    }

    let tags = all_meta_contents(doc, r#"meta[property="article:tag"]"#);
    if !tags.is_empty() {
        let topics = normalize_topics(tags.iter().map(String::as_str));
        if !topics.is_empty() {
            return Some(Sourced::new(topics, "article:tag"));
        }
    }

    if let Some(keywords) = ld_json_keywords(doc) {
        let topics = normalize_topics(keywords.iter().map(String::as_str));
        if !topics.is_empty() {
            return Some(Sourced::new(topics, "ld+json keywords"));
        }
    }

    let markup = all_element_texts(doc, r#"a[rel="tag"], .tags a, .post-tags a, .categories a"#);
    if !markup.is_empty() {
        let topics = normalize_topics(markup.iter().map(String::as_str));
        if !topics.is_empty() {
            return Some(Sourced::new(topics, "tag markup"));
        }
    }

    let segments = path_segment_topics(page_url);
    if !segments.is_empty() {
        return Some(Sourced::new(segments, "url path"));
    }

    if let Some(excerpt) = excerpt {
        let keywords = keyword_topics(&excerpt.value);
        if !keywords.is_empty() {
            return Some(Sourced::new(keywords, "keyword analysis"));
        }
    }

    None
}

// ===== Shared helpers =====

/// Collapses runs of whitespace into single spaces
fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}

/// Text of the first element matching the selector, cleaned; None if empty
fn element_text(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    for element in doc.select(&selector) {
        let text = clean_text(&element.text().collect::<String>());
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

/// Cleaned text of every element matching the selector
fn all_element_texts(doc: &Html, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    doc.select(&selector)
        .map(|e| clean_text(&e.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// `content` attribute of the first matching meta element
fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    first_attr(doc, selector, "content")
}

/// `content` attributes of every matching meta element
fn all_meta_contents(doc: &Html, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    doc.select(&selector)
        .filter_map(|e| e.value().attr("content"))
        .map(|v| clean_text(v))
        .filter(|v| !v.is_empty())
        .collect()
}

/// Twitter card tags appear with either `name` or `property`
fn twitter_meta(doc: &Html, tag: &str) -> Option<String> {
    meta_content(doc, &format!(r#"meta[name="{}"]"#, tag))
        .or_else(|| meta_content(doc, &format!(r#"meta[property="{}"]"#, tag)))
}

/// First non-empty attribute value among matching elements
fn first_attr(doc: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    for element in doc.select(&selector) {
        if let Some(value) = element.value().attr(attr) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Resolves a possibly-relative URL against the page URL
fn resolve_url(value: &str, page_url: &Url) -> Option<String> {
    page_url.join(value.trim()).ok().map(|u| u.to_string())
}

/// First `<p>` whose text clears the substantial-length bar
fn first_substantial_paragraph(doc: &Html) -> Option<String> {
    let selector = Selector::parse("p").ok()?;
    for element in doc.select(&selector) {
        let text = clean_text(&element.text().collect::<String>());
        if text.chars().count() >= SUBSTANTIAL_PARAGRAPH_CHARS {
            return Some(text);
        }
    }
    None
}

/// Concatenated paragraph text of a container element
fn container_text(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let container = doc.select(&selector).next()?;
    Some(paragraphs_of(container))
}

fn paragraphs_of(container: ElementRef) -> String {
    let Ok(p) = Selector::parse("p") else {
        return String::new();
    };
    let mut parts: Vec<String> = container
        .select(&p)
        .map(|e| clean_text(&e.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect();
    if parts.is_empty() {
        // A container with no <p> children still has text worth keeping
        parts.push(clean_text(&container.text().collect::<String>()));
    }
    parts.join(" ")
}

fn all_paragraph_text(doc: &Html) -> String {
    let Ok(p) = Selector::parse("p") else {
        return String::new();
    };
    doc.select(&p)
        .map(|e| clean_text(&e.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a date in the formats that appear in page metadata
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

// ===== ld+json helpers =====

/// Parses every `<script type="application/ld+json">` block, flattening
/// top-level arrays and `@graph` wrappers
fn ld_json_objects(doc: &Html) -> Vec<serde_json::Value> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut objects = Vec::new();
    for element in doc.select(&selector) {
        let raw = element.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        flatten_ld_json(value, &mut objects);
    }
    objects
}

fn flatten_ld_json(value: serde_json::Value, out: &mut Vec<serde_json::Value>) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                flatten_ld_json(item, out);
            }
        }
        serde_json::Value::Object(ref map) => {
            if let Some(graph) = map.get("@graph").cloned() {
                flatten_ld_json(graph, out);
            }
            out.push(value);
        }
        _ => {}
    }
}

/// First string value for `key` across all ld+json objects
///
/// Accepts a plain string, an array (first string element), or an object
/// with a `url` field (common for images).
fn ld_json_string(doc: &Html, key: &str) -> Option<String> {
    for object in ld_json_objects(doc) {
        if let Some(value) = object.get(key) {
            if let Some(s) = json_to_string(value) {
                return Some(s);
            }
        }
    }
    None
}

fn json_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let s = clean_text(s);
            (!s.is_empty()).then_some(s)
        }
        serde_json::Value::Array(items) => items.iter().find_map(json_to_string),
        serde_json::Value::Object(map) => map.get("url").and_then(json_to_string),
        _ => None,
    }
}

/// ld+json author: a string, an object with `name`, or an array of either
fn ld_json_author(doc: &Html) -> Option<String> {
    for object in ld_json_objects(doc) {
        let Some(author) = object.get("author") else {
            continue;
        };
        let name = match author {
            serde_json::Value::String(s) => Some(clean_text(s)),
            serde_json::Value::Object(map) => {
                map.get("name").and_then(|n| n.as_str()).map(clean_text)
            }
            serde_json::Value::Array(items) => items.iter().find_map(|item| match item {
                serde_json::Value::String(s) => Some(clean_text(s)),
                serde_json::Value::Object(map) => {
                    map.get("name").and_then(|n| n.as_str()).map(clean_text)
                }
                _ => None,
            }),
            _ => None,
        };
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            return Some(name);
        }
    }
    None
}

/// ld+json keywords: a comma-separated string or an array of strings
fn ld_json_keywords(doc: &Html) -> Option<Vec<String>> {
    for object in ld_json_objects(doc) {
        let Some(keywords) = object.get("keywords") else {
            continue;
        };
        let list: Vec<String> = match keywords {
            serde_json::Value::String(s) => s.split(',').map(|k| k.trim().to_string()).collect(),
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|i| i.as_str())
                .map(|k| k.trim().to_string())
                .collect(),
            _ => Vec::new(),
        };
        let list: Vec<String> = list.into_iter().filter(|k| !k.is_empty()).collect();
        if !list.is_empty() {
            return Some(list);
        }
    }
    None
}

// ===== Byline scan =====

/// Scans visible text for a "By Firstname Lastname" pattern
fn byline_scan(doc: &Html) -> Option<String> {
    let Ok(selector) = Selector::parse("p, span, div") else {
        return None;
    };

    for element in doc.select(&selector) {
        let text = clean_text(&element.text().collect::<String>());
        if text.len() > 120 {
            continue;
        }
        let Some(rest) = text.strip_prefix("By ").or_else(|| text.strip_prefix("by ")) else {
            continue;
        };

        let name_words: Vec<&str> = rest
            .split_whitespace()
            .take_while(|w| {
                w.chars().next().is_some_and(|c| c.is_uppercase())
                    && w.chars().all(|c| c.is_alphabetic() || c == '.' || c == '-')
            })
            .take(4)
            .collect();

        if name_words.len() >= 2 {
            return Some(name_words.join(" "));
        }
    }
    None
}

// ===== Topic helpers =====

const PATH_SEGMENT_STOPLIST: &[&str] = &[
    "article", "articles", "blog", "index", "news", "p", "page", "pages", "post", "posts",
    "story", "stories", "tag", "tags", "category",
];

const KEYWORD_STOPWORDS: &[&str] = &[
    "about", "after", "because", "being", "between", "could", "every", "first", "other",
    "their", "there", "these", "thing", "things", "those", "through", "under", "where",
    "which", "while", "would",
];

/// Trims, lowercases, deduplicates, and caps a topic list
fn normalize_topics<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut topics = Vec::new();
    for topic in raw {
        let topic = topic.trim().to_lowercase();
        if topic.is_empty() || topic.len() > 50 {
            continue;
        }
        if seen.insert(topic.clone()) {
            topics.push(topic);
        }
        if topics.len() == MAX_TOPICS {
            break;
        }
    }
    topics
}

/// Proposes topics from URL path segments, excluding the final slug
fn path_segment_topics(page_url: &Url) -> Vec<String> {
    let Some(segments) = page_url.path_segments() else {
        return Vec::new();
    };
    let segments: Vec<&str> = segments.collect();
    if segments.len() < 2 {
        // Only a slug; no classifying segments
        return Vec::new();
    }

    let classifying = &segments[..segments.len() - 1];
    let filtered = classifying.iter().copied().filter(|s| {
        s.len() >= 2
            && s.len() <= 30
            && s.chars().all(|c| c.is_ascii_alphabetic() || c == '-')
            && !PATH_SEGMENT_STOPLIST.contains(s)
    });

    normalize_topics(filtered)
}

/// Lightweight keyword frequency analysis over the body excerpt
fn keyword_topics(excerpt: &str) -> Vec<String> {
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for word in excerpt.split_whitespace() {
        let word: String = word
            .chars()
            .filter(|c| c.is_alphabetic())
            .collect::<String>()
            .to_lowercase();
        if word.len() < 5 || KEYWORD_STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> =
        counts.into_iter().filter(|(_, count)| *count >= 2).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    ranked.into_iter().take(5).map(|(word, _)| word).collect()
}
