//! Robots.txt policy evaluation
//!
//! Allow/Disallow matching is delegated to the robotstxt crate, which
//! implements longest-prefix precedence (a more specific `Allow` overrides a
//! shorter `Disallow`). Crawl-delay is not exposed by that crate, so it is
//! parsed by hand from the raw content.

use robotstxt::DefaultMatcher;

/// Evaluated robots.txt policy for one domain
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// Raw robots.txt content (empty means allow everything)
    content: String,
    /// Permissive policy, used when robots.txt could not be fetched
    permissive: bool,
}

impl RobotsPolicy {
    /// Creates a policy from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            permissive: false,
        }
    }

    /// Creates a permissive policy that allows everything
    ///
    /// This is the fallback when robots.txt cannot be fetched (404, timeout):
    /// a missing robots.txt must never block crawling of that domain.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            permissive: true,
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The full URL to check
    /// * `user_agent` - The user agent string
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.permissive || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay in seconds for a specific user agent
    ///
    /// A stanza naming our agent takes precedence over the `*` stanza.
    /// Returns `None` when no applicable Crawl-delay directive exists.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.permissive || self.content.is_empty() {
            return None;
        }

        let normalized_agent = user_agent.to_lowercase();

        // Group state: consecutive User-agent lines form one group; the
        // directives that follow apply to every agent in that group.
        let mut group_agents: Vec<String> = Vec::new();
        let mut in_group_body = false;
        let mut wildcard_delay: Option<f64> = None;
        let mut agent_delay: Option<f64> = None;

        for line in self.content.lines() {
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if in_group_body {
                        // A User-agent line after directives starts a new group
                        group_agents.clear();
                        in_group_body = false;
                    }
                    group_agents.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    in_group_body = true;
                    if let Ok(delay) = value.parse::<f64>() {
                        for agent in &group_agents {
                            if agent == "*" {
                                wildcard_delay = Some(delay);
                            } else if normalized_agent.contains(agent.as_str()) {
                                agent_delay = Some(delay);
                            }
                        }
                    }
                }
                _ => {
                    in_group_body = true;
                }
            }
        }

        agent_delay.or(wildcard_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let policy = RobotsPolicy::allow_all();
        assert!(policy.is_allowed("https://example.com/any/path", "ForagerBot"));
        assert!(policy.is_allowed("https://example.com/admin", "ForagerBot"));
        assert_eq!(policy.crawl_delay("ForagerBot"), None);
    }

    #[test]
    fn test_empty_content_allows() {
        let policy = RobotsPolicy::from_content("");
        assert!(policy.is_allowed("https://example.com/page", "ForagerBot"));
    }

    #[test]
    fn test_disallow_all() {
        let policy = RobotsPolicy::from_content("User-agent: *\nDisallow: /");
        assert!(!policy.is_allowed("https://example.com/", "ForagerBot"));
        assert!(!policy.is_allowed("https://example.com/page", "ForagerBot"));
    }

    #[test]
    fn test_disallow_prefix() {
        let policy = RobotsPolicy::from_content("User-agent: *\nDisallow: /private");
        assert!(policy.is_allowed("https://example.com/page", "ForagerBot"));
        assert!(!policy.is_allowed("https://example.com/private", "ForagerBot"));
        assert!(!policy.is_allowed("https://example.com/private/x", "ForagerBot"));
    }

    #[test]
    fn test_allow_overrides_shorter_disallow() {
        let policy =
            RobotsPolicy::from_content("User-agent: *\nDisallow: /private\nAllow: /private/public");
        assert!(!policy.is_allowed("https://example.com/private", "ForagerBot"));
        assert!(policy.is_allowed("https://example.com/private/public", "ForagerBot"));
    }

    #[test]
    fn test_specific_agent_stanza() {
        let policy = RobotsPolicy::from_content(
            "User-agent: ForagerBot\nDisallow: /\n\nUser-agent: *\nAllow: /",
        );
        assert!(!policy.is_allowed("https://example.com/page", "ForagerBot"));
        assert!(policy.is_allowed("https://example.com/page", "OtherBot"));
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let policy = RobotsPolicy::from_content("User-agent: *\nCrawl-delay: 10\nDisallow: /x");
        assert_eq!(policy.crawl_delay("ForagerBot"), Some(10.0));
        assert_eq!(policy.crawl_delay("AnyBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_specific_agent_wins() {
        let policy = RobotsPolicy::from_content(
            "User-agent: ForagerBot\nCrawl-delay: 5\n\nUser-agent: *\nCrawl-delay: 10",
        );
        assert_eq!(policy.crawl_delay("ForagerBot"), Some(5.0));
        assert_eq!(policy.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_decimal() {
        let policy = RobotsPolicy::from_content("User-agent: *\nCrawl-delay: 2.5");
        assert_eq!(policy.crawl_delay("ForagerBot"), Some(2.5));
    }

    #[test]
    fn test_crawl_delay_absent() {
        let policy = RobotsPolicy::from_content("User-agent: *\nDisallow: /admin");
        assert_eq!(policy.crawl_delay("ForagerBot"), None);
    }

    #[test]
    fn test_crawl_delay_case_insensitive() {
        let policy = RobotsPolicy::from_content("User-agent: ForagerBot\ncrawl-delay: 7");
        assert_eq!(policy.crawl_delay("foragerbot"), Some(7.0));
        assert_eq!(policy.crawl_delay("FORAGERBOT"), Some(7.0));
    }

    #[test]
    fn test_crawl_delay_grouped_agents() {
        let policy =
            RobotsPolicy::from_content("User-agent: BotA\nUser-agent: BotB\nCrawl-delay: 3");
        assert_eq!(policy.crawl_delay("BotA"), Some(3.0));
        assert_eq!(policy.crawl_delay("BotB"), Some(3.0));
        assert_eq!(policy.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_new_group_resets_agents() {
        let policy = RobotsPolicy::from_content(
            "User-agent: BotA\nDisallow: /a\n\nUser-agent: BotB\nCrawl-delay: 4",
        );
        assert_eq!(policy.crawl_delay("BotA"), None);
        assert_eq!(policy.crawl_delay("BotB"), Some(4.0));
    }

    #[test]
    fn test_garbage_content_is_permissive() {
        let policy = RobotsPolicy::from_content("this is not robots.txt {{{");
        assert!(policy.is_allowed("https://example.com/any", "ForagerBot"));
    }
}
