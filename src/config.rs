//! Resolver configuration.
//!
//! Built once at process start (from defaults or a JSON file) and passed by
//! reference to the components that need it.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::host::SearchOptions;

/// Practical needle ceiling observed on rich-text hosts, in UTF-16 code units.
pub const DEFAULT_SEARCH_CEILING: usize = 200;

/// Length of the hard truncation applied when shrinking alone is not enough.
pub const DEFAULT_HARD_TRUNCATE: usize = 150;

/// Host error codes that mean "needle invalid or too long".
pub const DEFAULT_TOLERATED_CODES: &[&str] = &["SearchStringInvalidOrTooLong", "InvalidArgument"];

/// Configuration for bounded search and anchor resolution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnchorConfig {
    /// Longest needle the host accepts, measured in UTF-16 code units.
    pub search_ceiling: usize,
    /// Number of chars kept by the first shrink attempt.
    pub shrink_prefix: usize,
    /// Hard truncation length in UTF-16 code units.
    pub hard_truncate: usize,
    /// Prefix/suffix probe length (chars) for two-part searches.
    pub edge_probe: usize,
    /// Host error codes recovered as an empty result.
    pub tolerated_codes: Vec<String>,
    /// `matchCase` used by the nth-match selector.
    pub nth_match_case: bool,
    /// `matchWholeWord` used by the nth-match selector.
    pub nth_match_whole_word: bool,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            search_ceiling: DEFAULT_SEARCH_CEILING,
            shrink_prefix: DEFAULT_SEARCH_CEILING,
            hard_truncate: DEFAULT_HARD_TRUNCATE,
            edge_probe: DEFAULT_SEARCH_CEILING / 2,
            tolerated_codes: DEFAULT_TOLERATED_CODES
                .iter()
                .map(|&c| c.to_owned())
                .collect(),
            nth_match_case: false,
            nth_match_whole_word: false,
        }
    }
}

impl AnchorConfig {
    /// Load a config from a JSON file; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config.clamped())
    }

    /// Keep the lengths consistent with the ceiling.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.search_ceiling = self.search_ceiling.max(1);
        self.hard_truncate = self.hard_truncate.clamp(1, self.search_ceiling);
        self.shrink_prefix = self.shrink_prefix.max(1);
        self.edge_probe = self.edge_probe.clamp(1, self.search_ceiling);
        self
    }

    /// Whether a host error code is recovered locally.
    pub fn is_tolerated(&self, code: &str) -> bool {
        self.tolerated_codes.iter().any(|c| c == code)
    }

    /// Search options for the nth-match selector.
    pub const fn nth_options(&self) -> SearchOptions {
        SearchOptions {
            match_case: self.nth_match_case,
            match_whole_word: self.nth_match_whole_word,
        }
    }
}
