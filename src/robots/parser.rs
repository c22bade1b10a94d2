//! Robots.txt policy implementation
//!
//! This module evaluates URLs against robots.txt content using the robotstxt crate.

use crate::url::normalize;
use robotstxt::DefaultMatcher;

/// The only user agent whose rules are evaluated
pub const USER_AGENT: &str = "*";

/// Where a policy came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    /// Parsed from a robots.txt body
    Loaded,
    /// robots.txt was unavailable; everything is allowed
    Fallback,
}

/// Allow/disallow rules for one project, immutable once built
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    content: String,
    source: PolicySource,
}

impl RobotsPolicy {
    /// Creates a policy from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            source: PolicySource::Loaded,
        }
    }

    /// Creates a permissive policy that allows everything
    ///
    /// Used when robots.txt cannot be fetched.
    pub fn permissive() -> Self {
        Self {
            content: String::new(),
            source: PolicySource::Fallback,
        }
    }

    pub fn source(&self) -> PolicySource {
        self.source
    }

    /// Returns true if this policy is the allow-all fallback
    pub fn is_fallback(&self) -> bool {
        self.source == PolicySource::Fallback
    }

    /// Checks whether `url` may be fetched by user agent `*`
    ///
    /// The URL is normalized first, so query URLs are evaluated in their
    /// `/path/?query` form.
    pub fn can_fetch(&self, url: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let normalized = normalize(url);
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, USER_AGENT, &normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissive() {
        let robots = RobotsPolicy::permissive();
        assert!(robots.is_fallback());
        assert!(robots.can_fetch("https://example.com/any/path"));
        assert!(robots.can_fetch("https://example.com/admin"));
    }

    #[test]
    fn test_disallow_all() {
        let robots = RobotsPolicy::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_fallback());
        assert!(!robots.can_fetch("https://example.com/"));
        assert!(!robots.can_fetch("https://example.com/page"));
    }

    #[test]
    fn test_disallow_specific() {
        let robots = RobotsPolicy::from_content("User-agent: *\nDisallow: /private");
        assert!(robots.can_fetch("https://example.com/"));
        assert!(robots.can_fetch("https://example.com/page"));
        assert!(!robots.can_fetch("https://example.com/private"));
        assert!(!robots.can_fetch("https://example.com/private/users"));
    }

    #[test]
    fn test_allow_overrides_disallow() {
        let robots =
            RobotsPolicy::from_content("User-agent: *\nDisallow: /private\nAllow: /private/public");
        assert!(!robots.can_fetch("https://example.com/private"));
        assert!(robots.can_fetch("https://example.com/private/public"));
    }

    #[test]
    fn test_other_agent_groups_ignored() {
        let robots =
            RobotsPolicy::from_content("User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nAllow: /");
        assert!(robots.can_fetch("https://example.com/page"));
    }

    #[test]
    fn test_query_url_checked_with_slash() {
        // `/search?q=1` is evaluated as `/search/?q=1`
        let robots = RobotsPolicy::from_content("User-agent: *\nDisallow: /search/");
        assert!(!robots.can_fetch("https://example.com/search?q=1"));
        assert!(robots.can_fetch("https://example.com/search"));
    }

    #[test]
    fn test_garbage_allows_all() {
        let robots = RobotsPolicy::from_content("This is not valid robots.txt {{{");
        assert!(robots.can_fetch("https://example.com/any/path"));
    }

    #[test]
    fn test_empty_allows_all() {
        let robots = RobotsPolicy::from_content("");
        assert!(robots.can_fetch("https://example.com/any/path"));
    }
}
