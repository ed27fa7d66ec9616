use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

pub const FALLBACK_ID: &str = "tweet_video";
pub const PINTEREST_FALLBACK_ID: &str = "pinterest_pin";
pub const INSTAGRAM_FALLBACK_ID: &str = "instagram_post";

const TWITTER_HOSTS: &[&str] = &["twitter.com", "x.com"];
const PINTEREST_HOSTS: &[&str] = &["pinterest.com", "pin.it"];
const INSTAGRAM_HOSTS: &[&str] = &["instagram.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Twitter,
    Pinterest,
    Instagram,
    Generic,
}

impl Platform {
    pub fn detect(url: &str) -> Self {
        let Ok(parsed) = Url::parse(url.trim()) else {
            return Platform::Generic;
        };
        let Some(host) = parsed.host_str() else {
            return Platform::Generic;
        };
        let host = host.to_ascii_lowercase();
        if host_matches(&host, TWITTER_HOSTS) {
            Platform::Twitter
        } else if host_matches(&host, PINTEREST_HOSTS) {
            Platform::Pinterest
        } else if host_matches(&host, INSTAGRAM_HOSTS) {
            Platform::Instagram
        } else {
            Platform::Generic
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, Platform::Generic)
    }

    pub fn label(self) -> &'static str {
        match self {
            Platform::Twitter => "Twitter/X",
            Platform::Pinterest => "Pinterest",
            Platform::Instagram => "Instagram",
            Platform::Generic => "generic",
        }
    }

    pub fn extract_id(self, url: &str) -> String {
        match self {
            Platform::Twitter | Platform::Generic => extract_id(url),
            Platform::Pinterest => {
                capture_first(pinterest_pattern(), url).unwrap_or_else(|| PINTEREST_FALLBACK_ID.into())
            }
            Platform::Instagram => {
                capture_first(instagram_pattern(), url).unwrap_or_else(|| INSTAGRAM_FALLBACK_ID.into())
            }
        }
    }

    /// Format selector handed to the downloader. Pinterest serves GIF-like pins and
    /// lets the downloader pick on its own.
    pub fn fetch_format(self, configured: &str) -> Option<String> {
        match self {
            Platform::Pinterest => None,
            _ if configured.trim().is_empty() => None,
            _ => Some(configured.to_string()),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pulls the numeric post identifier out of a `status/<digits>` URL.
pub fn extract_id(url: &str) -> String {
    capture_first(status_pattern(), url).unwrap_or_else(|| FALLBACK_ID.to_string())
}

fn host_matches(host: &str, domains: &[&str]) -> bool {
    domains
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

fn capture_first(pattern: &Regex, url: &str) -> Option<String> {
    pattern
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

fn status_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"status/(\d+)").expect("static regex"))
}

fn pinterest_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"pin/(\d+)").expect("static regex"))
}

fn instagram_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/(?:p|reel)/([A-Za-z0-9_-]+)").expect("static regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_status_ids() {
        assert_eq!(
            extract_id("https://twitter.com/user/status/1234567890123456789"),
            "1234567890123456789"
        );
        assert_eq!(
            extract_id("https://x.com/user/status/9876543210987654321"),
            "9876543210987654321"
        );
        assert_eq!(
            extract_id("https://x.com/user/status/1234567890123456789?s=20&t=abc"),
            "1234567890123456789"
        );
        assert_eq!(extract_id("https://example.org/a/status/42"), "42");
    }

    #[test]
    fn unmatched_urls_use_fallback() {
        for url in [
            "https://x.com/user",
            "https://youtube.com/watch?v=123",
            "",
            "not-a-url",
            "https://x.com/user/status/",
        ] {
            assert_eq!(extract_id(url), FALLBACK_ID, "url: {url:?}");
        }
    }

    #[test]
    fn detects_platforms_by_host() {
        assert_eq!(Platform::detect("https://x.com/a/status/1"), Platform::Twitter);
        assert_eq!(
            Platform::detect("https://mobile.twitter.com/a/status/1"),
            Platform::Twitter
        );
        assert_eq!(
            Platform::detect("https://www.pinterest.com/pin/123/"),
            Platform::Pinterest
        );
        assert_eq!(
            Platform::detect("https://www.instagram.com/reel/Cx_1-a/"),
            Platform::Instagram
        );
        assert_eq!(Platform::detect("https://netbox.com/video"), Platform::Generic);
        assert_eq!(Platform::detect("not-a-url"), Platform::Generic);
        assert!(!Platform::Generic.is_supported());
    }

    #[test]
    fn platform_specific_identifiers() {
        assert_eq!(
            Platform::Pinterest.extract_id("https://pinterest.com/pin/998877/"),
            "998877"
        );
        assert_eq!(
            Platform::Pinterest.extract_id("https://pinterest.com/board"),
            PINTEREST_FALLBACK_ID
        );
        assert_eq!(
            Platform::Instagram.extract_id("https://instagram.com/p/AbC_12-x/"),
            "AbC_12-x"
        );
        assert_eq!(
            Platform::Instagram.extract_id("https://instagram.com/reel/Zz9/?igsh=1"),
            "Zz9"
        );
        assert_eq!(
            Platform::Instagram.extract_id("https://instagram.com/someone"),
            INSTAGRAM_FALLBACK_ID
        );
    }

    #[test]
    fn pinterest_skips_format_selection() {
        assert_eq!(Platform::Pinterest.fetch_format("best"), None);
        assert_eq!(
            Platform::Twitter.fetch_format("best").as_deref(),
            Some("best")
        );
        assert_eq!(Platform::Generic.fetch_format("  "), None);
    }
}
