//! In-memory document host.
//!
//! Backs the CLI and the test suite. Spans are char indices into the body.
//! Besides real substring search it can emulate a needle length ceiling,
//! fail chosen needles with a host error code, and return scripted results
//! for a needle (hosts are free to return overlapping ranges).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{HostRange, MutableHost, SearchHost, SearchOptions};
use crate::error::HostError;
use crate::search::utf16_len;
use crate::types::Span;

/// Range handle into a [`MemoryHost`] body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub span: Span,
}

impl HostRange for MemoryRange {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Default)]
struct State {
    body: Vec<char>,
    searches: Vec<String>,
    syncs: usize,
}

/// A document held in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<State>,
    ceiling: Option<usize>,
    failures: HashMap<String, HostError>,
    scripted: HashMap<String, Vec<Span>>,
}

impl MemoryHost {
    pub fn new(body: &str) -> Self {
        Self {
            state: Mutex::new(State {
                body: body.chars().collect(),
                ..State::default()
            }),
            ..Self::default()
        }
    }

    /// Reject needles longer than `ceiling` UTF-16 units with
    /// `SearchStringInvalidOrTooLong`, like rich-text hosts do.
    #[must_use]
    pub fn with_search_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// Fail every search for exactly `needle` with `error`.
    #[must_use]
    pub fn with_failure(mut self, needle: &str, error: HostError) -> Self {
        self.failures.insert(needle.to_owned(), error);
        self
    }

    /// Answer searches for exactly `needle` with `spans`, in that order.
    #[must_use]
    pub fn with_scripted(mut self, needle: &str, spans: Vec<Span>) -> Self {
        self.scripted.insert(needle.to_owned(), spans);
        self
    }

    /// Needles received by `search`, in call order.
    pub fn searches(&self) -> Vec<String> {
        self.lock().map(|s| s.searches.clone()).unwrap_or_default()
    }

    /// Number of completed `sync` calls.
    pub fn sync_count(&self) -> usize {
        self.lock().map(|s| s.syncs).unwrap_or_default()
    }

    /// Current body.
    pub fn body(&self) -> String {
        self.lock()
            .map(|s| s.body.iter().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, HostError> {
        self.state
            .lock()
            .map_err(|_| HostError::new("GeneralException", "document state poisoned"))
    }
}

fn chars_equal(a: char, b: char, match_case: bool) -> bool {
    if match_case {
        a == b
    } else {
        a == b || a.to_lowercase().eq(b.to_lowercase())
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Non-overlapping occurrences of `needle` in `body`, left to right.
fn find_all(body: &[char], needle: &[char], options: SearchOptions) -> Vec<Span> {
    let mut spans = Vec::new();
    if needle.is_empty() || needle.len() > body.len() {
        return spans;
    }

    let mut i = 0;
    while i + needle.len() <= body.len() {
        let window = &body[i..i + needle.len()];
        let hit = window
            .iter()
            .zip(needle)
            .all(|(&a, &b)| chars_equal(a, b, options.match_case));

        let whole_word = !options.match_whole_word
            || ((i == 0 || !is_word_char(body[i - 1]))
                && body
                    .get(i + needle.len())
                    .is_none_or(|&c| !is_word_char(c)));

        if hit && whole_word {
            spans.push(Span::new(i, i + needle.len()));
            i += needle.len();
        } else {
            i += 1;
        }
    }
    spans
}

#[async_trait]
impl SearchHost for MemoryHost {
    type Range = MemoryRange;

    async fn search(
        &self,
        needle: &str,
        options: SearchOptions,
    ) -> Result<Vec<MemoryRange>, HostError> {
        let mut state = self.lock()?;
        state.searches.push(needle.to_owned());

        if let Some(ceiling) = self.ceiling {
            if utf16_len(needle) > ceiling {
                return Err(HostError::new(
                    "SearchStringInvalidOrTooLong",
                    format!("search string exceeds {ceiling} characters"),
                ));
            }
        }
        if let Some(error) = self.failures.get(needle) {
            return Err(error.clone());
        }
        if let Some(spans) = self.scripted.get(needle) {
            return Ok(spans.iter().map(|&span| MemoryRange { span }).collect());
        }

        let needle: Vec<char> = needle.chars().collect();
        let spans = find_all(&state.body, &needle, options);
        debug!(hits = spans.len(), "memory host search");
        Ok(spans.into_iter().map(|span| MemoryRange { span }).collect())
    }

    fn expand_to(&self, first: &MemoryRange, last: &MemoryRange) -> MemoryRange {
        MemoryRange {
            span: Span::new(
                first.span.start.min(last.span.start),
                first.span.end.max(last.span.end),
            ),
        }
    }

    async fn sync(&self) -> Result<(), HostError> {
        self.lock()?.syncs += 1;
        Ok(())
    }
}

#[async_trait]
impl MutableHost for MemoryHost {
    async fn text(&self) -> Result<String, HostError> {
        Ok(self.lock()?.body.iter().collect())
    }

    async fn replace_range(&self, range: &MemoryRange, text: &str) -> Result<(), HostError> {
        let mut state = self.lock()?;
        let Span { start, end } = range.span;
        if start > end || end > state.body.len() {
            return Err(HostError::new(
                "InvalidArgument",
                format!("range {start}..{end} outside document of {}", state.body.len()),
            ));
        }
        state.body.splice(start..end, text.chars());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_case_and_word() {
        let host = MemoryHost::new("Cat scatter cat");

        let exact = host.search("cat", SearchOptions::EXACT).await.expect("search");
        assert_eq!(
            exact.iter().map(HostRange::span).collect::<Vec<_>>(),
            vec![Span::new(5, 8), Span::new(12, 15)]
        );

        let folded = host
            .search("cat", SearchOptions::default())
            .await
            .expect("search");
        assert_eq!(folded.len(), 3);

        let words = host
            .search(
                "cat",
                SearchOptions {
                    match_case: false,
                    match_whole_word: true,
                },
            )
            .await
            .expect("search");
        assert_eq!(
            words.iter().map(HostRange::span).collect::<Vec<_>>(),
            vec![Span::new(0, 3), Span::new(12, 15)]
        );
    }

    #[tokio::test]
    async fn test_ceiling_and_failures() {
        let host = MemoryHost::new("abc")
            .with_search_ceiling(2)
            .with_failure("b", HostError::new("GeneralException", "boom"));

        let err = host.search("abc", SearchOptions::EXACT).await.expect_err("should fail");
        assert_eq!(err.code, "SearchStringInvalidOrTooLong");

        let err = host.search("b", SearchOptions::EXACT).await.expect_err("should fail");
        assert_eq!(err.code, "GeneralException");

        assert_eq!(host.searches(), vec!["abc", "b"]);
    }

    #[tokio::test]
    async fn test_replace_range() {
        let host = MemoryHost::new("one two three");
        let range = MemoryRange {
            span: Span::new(4, 7),
        };
        host.replace_range(&range, "2").await.expect("replace");
        host.sync().await.expect("sync");
        assert_eq!(host.body(), "one 2 three");
        assert_eq!(host.sync_count(), 1);

        let bad = MemoryRange {
            span: Span::new(4, 99),
        };
        assert!(host.replace_range(&bad, "x").await.is_err());
    }
}
