//! Bounded search over a host.
//!
//! Host search primitives reject needles past a fixed length and report
//! "invalid or too long" through error codes. [`bounded_search`] shrinks
//! overlong needles before the call and turns tolerated error codes into a
//! [`SearchOutcome::Recovered`] so callers never inspect codes themselves.
//!
//! # Shrinking
//!
//! 1. Keep the first `shrink_prefix` chars and trim surrounding whitespace.
//! 2. If that is still over the ceiling (wide chars count twice in UTF-16),
//!    hard-truncate to `hard_truncate` UTF-16 units (never more than the
//!    ceiling) and drop trailing whitespace.
//!
//! Shrinking is best effort: a shrunk needle can match more places than the
//! original.

pub mod anchors;
pub mod nth;

use tracing::{debug, warn};

use crate::config::AnchorConfig;
use crate::error::AnchorResult;
use crate::host::{SearchHost, SearchOptions};

pub use anchors::{find_anchors, find_replacement_span, prune_overlaps};
pub use nth::{search_nth, select_nth};

/// Result of a bounded search that did not fail fatally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome<R> {
    /// The host answered; possibly with zero matches.
    Matches(Vec<R>),
    /// The host rejected the needle with a tolerated code.
    Recovered { code: String },
}

impl<R> SearchOutcome<R> {
    /// Matches, or nothing for a recovered failure.
    pub fn into_matches(self) -> Vec<R> {
        match self {
            Self::Matches(items) => items,
            Self::Recovered { .. } => Vec::new(),
        }
    }

    pub const fn is_recovered(&self) -> bool {
        matches!(self, Self::Recovered { .. })
    }
}

/// Length as the host measures it.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Longest prefix of `s` that fits in `limit` UTF-16 units.
fn truncate_utf16(s: &str, limit: usize) -> &str {
    let mut units = 0;
    for (idx, c) in s.char_indices() {
        units += c.len_utf16();
        if units > limit {
            return &s[..idx];
        }
    }
    s
}

/// Fit `needle` under the configured search ceiling.
///
/// Needles already under the ceiling are returned unchanged.
pub fn shrink_needle<'a>(needle: &'a str, config: &AnchorConfig) -> &'a str {
    let ceiling = config.search_ceiling;
    if utf16_len(needle) <= ceiling {
        return needle;
    }

    let end = needle
        .char_indices()
        .nth(config.shrink_prefix)
        .map_or(needle.len(), |(idx, _)| idx);
    let prefix = needle[..end].trim();
    if utf16_len(prefix) <= ceiling {
        debug!(from = utf16_len(needle), to = utf16_len(prefix), "needle shrunk to prefix");
        return prefix;
    }

    let limit = config.hard_truncate.min(ceiling);
    let truncated = truncate_utf16(needle.trim_start(), limit).trim_end();
    debug!(
        from = utf16_len(needle),
        to = utf16_len(truncated),
        "needle hard-truncated"
    );
    truncated
}

/// Search the host with a needle that respects the search ceiling.
///
/// Empty needles return no matches without calling the host. Tolerated host
/// codes become [`SearchOutcome::Recovered`]; any other host error is
/// returned as [`crate::AnchorError::Host`].
pub async fn bounded_search<H>(
    host: &H,
    needle: &str,
    options: SearchOptions,
    config: &AnchorConfig,
) -> AnchorResult<SearchOutcome<H::Range>>
where
    H: SearchHost + ?Sized,
{
    if needle.is_empty() {
        return Ok(SearchOutcome::Matches(Vec::new()));
    }

    let needle = shrink_needle(needle, config);
    if needle.is_empty() {
        return Ok(SearchOutcome::Matches(Vec::new()));
    }

    match host.search(needle, options).await {
        Ok(items) => Ok(SearchOutcome::Matches(items)),
        Err(e) if config.is_tolerated(&e.code) => {
            warn!(
                code = e.code,
                needle_len = utf16_len(needle),
                "search rejected by host, continuing with no matches"
            );
            Ok(SearchOutcome::Recovered { code: e.code })
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnchorError, HostError};
    use crate::host::memory::MemoryHost;

    #[test]
    fn test_short_needle_untouched() {
        let config = AnchorConfig::default();
        assert_eq!(shrink_needle("abc", &config), "abc");
    }

    #[test]
    fn test_shrink_to_trimmed_prefix() {
        let config = AnchorConfig {
            search_ceiling: 10,
            shrink_prefix: 10,
            hard_truncate: 6,
            ..AnchorConfig::default()
        };
        assert_eq!(shrink_needle("hello wor ld and more", &config), "hello wor");
    }

    #[test]
    fn test_hard_truncate_wide_chars() {
        let config = AnchorConfig {
            search_ceiling: 10,
            shrink_prefix: 10,
            hard_truncate: 6,
            ..AnchorConfig::default()
        };
        // A ten-char prefix of emoji is twenty UTF-16 units.
        let needle = "\u{1F600}".repeat(12);
        let shrunk = shrink_needle(&needle, &config);
        assert_eq!(utf16_len(shrunk), 6);
        assert_eq!(shrunk.chars().count(), 3);
    }

    #[test]
    fn test_hard_truncate_capped_at_ceiling() {
        let config = AnchorConfig {
            search_ceiling: 10,
            shrink_prefix: 10,
            hard_truncate: 50,
            ..AnchorConfig::default()
        };
        let needle = "\u{1F600}".repeat(30);
        let shrunk = shrink_needle(&needle, &config);
        assert_eq!(utf16_len(shrunk), 10);
    }

    #[test]
    fn test_hard_truncate_drops_trailing_whitespace() {
        let config = AnchorConfig {
            search_ceiling: 10,
            shrink_prefix: 10,
            hard_truncate: 6,
            ..AnchorConfig::default()
        };
        let needle = format!("\u{1F600}\u{1F600}  {}", "\u{1F600}".repeat(10));
        assert_eq!(shrink_needle(&needle, &config), "\u{1F600}\u{1F600}");
    }

    #[tokio::test]
    async fn test_wide_needle_never_exceeds_ceiling() {
        let config = AnchorConfig {
            search_ceiling: 10,
            shrink_prefix: 10,
            hard_truncate: 50,
            ..AnchorConfig::default()
        };
        let host = MemoryHost::new("text").with_search_ceiling(10);
        let needle = "\u{1F600}".repeat(30);
        let outcome = bounded_search(&host, &needle, SearchOptions::EXACT, &config)
            .await
            .expect("search");
        assert!(!outcome.is_recovered());
        let sent = host.searches();
        assert!(utf16_len(&sent[0]) <= config.search_ceiling);
    }

    #[tokio::test]
    async fn test_empty_needle_skips_host() {
        let host = MemoryHost::new("text");
        let outcome = bounded_search(&host, "", SearchOptions::EXACT, &AnchorConfig::default())
            .await
            .expect("search");
        assert_eq!(outcome, SearchOutcome::Matches(Vec::new()));
        assert!(host.searches().is_empty());
    }

    #[tokio::test]
    async fn test_overlong_needle_shrunk_before_call() {
        let config = AnchorConfig::default();
        let host = MemoryHost::new("short").with_search_ceiling(config.search_ceiling);
        let needle = "word ".repeat(100);

        let outcome = bounded_search(&host, &needle, SearchOptions::EXACT, &config)
            .await
            .expect("search");
        assert!(!outcome.is_recovered());

        let sent = host.searches();
        assert_eq!(sent.len(), 1);
        assert!(utf16_len(&sent[0]) <= config.search_ceiling);
    }

    #[tokio::test]
    async fn test_tolerated_code_recovers() {
        let host = MemoryHost::new("text")
            .with_failure("x", HostError::new("InvalidArgument", "bad needle"));
        let outcome = bounded_search(&host, "x", SearchOptions::EXACT, &AnchorConfig::default())
            .await
            .expect("recovered");
        assert!(outcome.is_recovered());
        assert!(outcome.into_matches().is_empty());
    }

    #[tokio::test]
    async fn test_other_codes_propagate() {
        let host = MemoryHost::new("text")
            .with_failure("x", HostError::new("GeneralException", "host went away"));
        let err = bounded_search(&host, "x", SearchOptions::EXACT, &AnchorConfig::default())
            .await
            .expect_err("fatal");
        assert!(matches!(err, AnchorError::Host(ref e) if e.code == "GeneralException"));
    }
}
