//! Heuristics for spotting higher-resolution sources.
//!
//! Two signals are used: raw-source rules that rewrite a displayed URL into
//! the original it was derived from, and URL-like substrings embedded in an
//! element's non-structural attributes (`data-src`, `data-original`, ...).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

// ============================================================================
// Constants
// ============================================================================

/// Attributes never inspected for embedded URLs.
pub const PASS_LIST: [&str; 12] = [
    "class",
    "style",
    "src",
    "alt",
    "title",
    "loading",
    "crossorigin",
    "height",
    "width",
    "sizes",
    "onerror",
    "data-error",
];

/// Absolute, protocol-relative or root-relative URL-like substrings.
static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?:/)?/\S+").expect("valid URL pattern"));

/// Leading scheme that gets rewritten to the document protocol.
static SCHEME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?:").expect("valid scheme pattern"));

// ============================================================================
// Free functions
// ============================================================================

/// Returns `true` if `name` is never inspected for embedded URLs.
#[inline]
#[must_use]
pub fn is_pass_listed(name: &str) -> bool {
    PASS_LIST.contains(&name)
}

/// URL-like substrings of `value`, in order of appearance.
#[must_use]
pub fn extract_urls(value: &str) -> Vec<&str> {
    URL_REGEX.find_iter(value).map(|m| m.as_str()).collect()
}

/// Replaces a leading `http:`/`https:` with `protocol` (e.g. `https:`).
#[must_use]
pub fn normalize_protocol(url: &str, protocol: &str) -> String {
    SCHEME_REGEX.replace(url, protocol).into_owned()
}

// ============================================================================
// RawSourceRule
// ============================================================================

/// Rewrites a displayed URL into the original it was derived from.
pub trait RawSourceRule: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Raw source for `current`, if this rule recognises it.
    fn raw_source(&self, current: &str) -> Option<String>;
}

/// `photo-300x200.jpg` → `photo.jpg`.
#[derive(Debug)]
pub struct ResolutionSuffixRule {
    regex: Regex,
}

impl ResolutionSuffixRule {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regex: Regex::new(r"^(.+/[^/]*?)-\d+x\d+(\.[A-Za-z0-9]+)(?:[?#].*)?$")
                .expect("valid resolution suffix pattern"),
        }
    }
}

impl Default for ResolutionSuffixRule {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSourceRule for ResolutionSuffixRule {
    fn name(&self) -> &'static str {
        "resolution-suffix"
    }

    fn raw_source(&self, current: &str) -> Option<String> {
        let caps = self.regex.captures(current)?;
        Some(format!("{}{}", &caps[1], &caps[2]))
    }
}

/// Drops whatever sits between a file name and its image extension, or
/// after it: `a.jpg?w=200` → `a.jpg`, `a.thumb.png` → `a.png`.
#[derive(Debug)]
pub struct ExtensionArgsRule {
    regex: Regex,
}

impl ExtensionArgsRule {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regex: Regex::new(r"(?i)(.+/.*?\.).*(png|jpeg|jpg|gif|bmp|tiff|webp).*")
                .expect("valid extension args pattern"),
        }
    }
}

impl Default for ExtensionArgsRule {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSourceRule for ExtensionArgsRule {
    fn name(&self) -> &'static str {
        "extension-args"
    }

    fn raw_source(&self, current: &str) -> Option<String> {
        let caps = self.regex.captures(current)?;
        Some(format!("{}{}", &caps[1], &caps[2]))
    }
}

// ============================================================================
// RawPatternSet
// ============================================================================

/// Ordered list of [`RawSourceRule`]s. The first rule producing a URL that
/// differs from the current one wins.
pub struct RawPatternSet {
    rules: Vec<Box<dyn RawSourceRule>>,
}

impl fmt::Debug for RawPatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| rule.name()))
            .finish()
    }
}

impl Default for RawPatternSet {
    fn default() -> Self {
        Self::empty()
            .with_rule(ResolutionSuffixRule::new())
            .with_rule(ExtensionArgsRule::new())
    }
}

impl RawPatternSet {
    /// Creates a set with no rules.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule with the lowest priority.
    #[must_use]
    pub fn with_rule(mut self, rule: impl RawSourceRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Number of rules.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if there are no rules.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns `true` if any rule recognises `current`.
    ///
    /// `data:` URLs never match.
    #[must_use]
    pub fn matches(&self, current: &str) -> bool {
        !current.starts_with("data")
            && self
                .rules
                .iter()
                .any(|rule| rule.raw_source(current).is_some())
    }

    /// First raw source that differs from `current`, with the rule name.
    #[must_use]
    pub fn raw_source(&self, current: &str) -> Option<(&'static str, String)> {
        if current.starts_with("data") {
            return None;
        }
        self.rules.iter().find_map(|rule| {
            rule.raw_source(current)
                .filter(|raw| raw != current)
                .map(|raw| (rule.name(), raw))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_urls() {
        let value = "https://a.test/s.jpg 320w, //a.test/m.jpg 640w, /l.jpg 1280w";
        assert_eq!(
            extract_urls(value),
            vec!["https://a.test/s.jpg", "//a.test/m.jpg", "/l.jpg"]
        );
        assert!(extract_urls("lazyload").is_empty());
    }

    #[test]
    fn test_pass_list() {
        assert!(is_pass_listed("src"));
        assert!(is_pass_listed("data-error"));
        assert!(!is_pass_listed("data-src"));
        assert!(!is_pass_listed("srcset"));
    }

    #[test]
    fn test_normalize_protocol_only_touches_leading_scheme() {
        assert_eq!(
            normalize_protocol("http://a.test/x.jpg", "https:"),
            "https://a.test/x.jpg"
        );
        assert_eq!(
            normalize_protocol("//a.test/x.jpg?next=http://b", "https:"),
            "//a.test/x.jpg?next=http://b"
        );
    }

    #[test]
    fn test_extension_args_rule() {
        let rule = ExtensionArgsRule::new();
        assert_eq!(
            rule.raw_source("https://a.test/img/cat.jpg?w=200&h=100").as_deref(),
            Some("https://a.test/img/cat.jpg")
        );
        assert_eq!(
            rule.raw_source("https://a.test/img/cat.thumb.PNG").as_deref(),
            Some("https://a.test/img/cat.PNG")
        );
        assert_eq!(rule.raw_source("https://a.test/img/cat"), None);
    }

    #[test]
    fn test_resolution_suffix_rule() {
        let rule = ResolutionSuffixRule::new();
        assert_eq!(
            rule.raw_source("https://a.test/up/cat-300x200.jpg").as_deref(),
            Some("https://a.test/up/cat.jpg")
        );
        assert_eq!(rule.raw_source("https://a.test/up/cat.jpg"), None);
    }

    #[test]
    fn test_pattern_set_skips_identity_rewrites() {
        let set = RawPatternSet::default();
        assert_eq!(set.len(), 2);

        assert!(set.matches("https://a.test/cat.jpg"));
        assert_eq!(set.raw_source("https://a.test/cat.jpg"), None);

        let (rule, raw) = set
            .raw_source("https://a.test/cat-640x480.jpg")
            .expect("suffix rewrite");
        assert_eq!(rule, "resolution-suffix");
        assert_eq!(raw, "https://a.test/cat.jpg");
    }

    #[test]
    fn test_data_urls_never_match() {
        let set = RawPatternSet::default();
        assert!(!set.matches("data:image/png;base64,abc/x.png"));
        assert_eq!(set.raw_source("data:image/png;base64,abc/x.png"), None);
    }

    #[test]
    fn test_custom_rule() {
        struct CdnRule;
        impl RawSourceRule for CdnRule {
            fn name(&self) -> &'static str {
                "cdn"
            }
            fn raw_source(&self, current: &str) -> Option<String> {
                current
                    .contains("/thumbs/")
                    .then(|| current.replace("/thumbs/", "/originals/"))
            }
        }

        let set = RawPatternSet::empty().with_rule(CdnRule);
        assert_eq!(
            set.raw_source("https://a.test/thumbs/1"),
            Some(("cdn", "https://a.test/originals/1".to_string()))
        );
    }
}
