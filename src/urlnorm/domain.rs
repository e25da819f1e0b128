use url::Url;

/// Extracts the domain from a URL
///
/// Returns the host portion of a URL, lowercased. `None` if the URL has no
/// host (which shouldn't happen for valid HTTP(S) URLs).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use forager::urlnorm::extract_domain;
///
/// let url = Url::parse("https://Blog.Example.COM/post").unwrap();
/// assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether a candidate domain belongs to the same site as a source domain
///
/// A `www.` prefix is ignored on both sides, and subdomains of the source
/// domain count as the same site. Used by the web source parser to restrict
/// discovered links to the source's registered site.
///
/// # Examples
///
/// ```
/// use forager::urlnorm::is_same_site;
///
/// assert!(is_same_site("example.com", "example.com"));
/// assert!(is_same_site("www.example.com", "example.com"));
/// assert!(is_same_site("blog.example.com", "example.com"));
/// assert!(!is_same_site("example.org", "example.com"));
/// assert!(!is_same_site("notexample.com", "example.com"));
/// ```
pub fn is_same_site(candidate: &str, source: &str) -> bool {
    let candidate = candidate.strip_prefix("www.").unwrap_or(candidate);
    let source = source.strip_prefix("www.").unwrap_or(source);

    candidate == source || candidate.ends_with(&format!(".{}", source))
}
