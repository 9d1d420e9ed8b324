//! Text canonicalization with a canonical → raw offset map.
//!
//! The analysis pass runs over a canonical copy of the document, while the
//! live document keeps its typographic quotes, non-breaking spaces, zero-width
//! joiners and CRLF line endings. [`normalize`] produces the canonical text
//! together with an offset map so canonical spans can be translated back to
//! raw ones; [`normalize_for_search`] and [`normalize_intake_text`] produce the
//! same text without tracking positions.
//!
//! # Transformations
//!
//! | Raw                                   | Canonical            |
//! |---------------------------------------|----------------------|
//! | `“ ” „ ‟ « »`                         | `"`                  |
//! | `’ ‘ ‚ ‛ ‹ ›`                         | `'`                  |
//! | `— – − ‐ ‑ ‒ ―`                       | `-`                  |
//! | NBSP and typographic spaces, tab      | space                |
//! | U+200B, U+200C, U+200D, U+FEFF        | deleted              |
//! | `\r\n`, `\r`                          | `\n`                 |
//! | run of spaces                         | one space            |
//! | spaces touching a newline             | absorbed             |
//! | leading / trailing whitespace         | trimmed              |
//!
//! All indices are char indices. Every emitted char maps to the first raw
//! char that contributed to it, so the map is non-decreasing and has exactly
//! one entry per canonical char.

use crate::types::Span;

/// How a single raw char participates in the canonical text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    /// Removed without a trace.
    Drop,
    /// Horizontal whitespace, collapsible.
    Space,
    /// `\n` or `\r` (a following `\n` is folded in by the caller).
    Newline,
    /// Emitted as the given char.
    Emit(char),
}

const fn classify(c: char) -> CharClass {
    match c {
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' => CharClass::Drop,
        '\n' | '\r' => CharClass::Newline,
        ' ' | '\t' | '\u{000B}' | '\u{000C}' | '\u{00A0}' | '\u{2002}'..='\u{200A}'
        | '\u{202F}' | '\u{205F}' | '\u{3000}' => CharClass::Space,
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => {
            CharClass::Emit('"')
        }
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2039}' | '\u{203A}' => {
            CharClass::Emit('\'')
        }
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => CharClass::Emit('-'),
        other => CharClass::Emit(other),
    }
}

/// Canonical text plus its offset map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    text: String,
    map: Vec<usize>,
}

impl Normalized {
    /// The canonical text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// For each canonical char, the index of its first raw contributor.
    pub fn map(&self) -> &[usize] {
        &self.map
    }

    /// Number of chars in the canonical text (equals `map().len()`).
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn into_parts(self) -> (String, Vec<usize>) {
        (self.text, self.map)
    }

    /// Translate a canonical span into raw coordinates.
    ///
    /// The raw end is one past the first raw char behind the last canonical
    /// char. Returns `None` for empty or out-of-range spans.
    pub fn raw_span(&self, canonical: Span) -> Option<Span> {
        if canonical.is_empty() || canonical.end > self.map.len() {
            return None;
        }
        let start = self.map[canonical.start];
        let end = self.map[canonical.end - 1] + 1;
        Some(Span::new(start, end))
    }

    /// Canonical index of the first canonical char whose raw source is at or
    /// after `raw_index`. Returns `len()` if there is none.
    pub fn canonical_index(&self, raw_index: usize) -> usize {
        self.map.partition_point(|&r| r < raw_index)
    }

    /// Translate a raw span into canonical coordinates.
    pub fn canonical_span(&self, raw: Span) -> Span {
        Span::new(self.canonical_index(raw.start), self.canonical_index(raw.end))
    }
}

/// Normalize `raw`, tracking where each canonical char came from.
///
/// Accepts `&str` or `Option<&str>`; `None` and `""` both yield an empty
/// result.
pub fn normalize<'a>(raw: impl Into<Option<&'a str>>) -> Normalized {
    let Some(raw) = raw.into() else {
        return Normalized::default();
    };
    let mut map = Vec::with_capacity(raw.len());
    let text = canonicalize(raw, Some(&mut map));
    Normalized { text, map }
}

/// Canonical text only, for plain equality checks on intake.
///
/// Always equal to `normalize(raw).text()`.
pub fn normalize_intake_text<'a>(raw: impl Into<Option<&'a str>>) -> String {
    raw.into()
        .map(|raw| canonicalize(raw, None))
        .unwrap_or_default()
}

/// Canonical form of a search needle. Needles are never re-indexed, so no
/// map is kept.
pub fn normalize_for_search(snippet: &str) -> String {
    canonicalize(snippet, None)
}

fn push(out: &mut String, map: &mut Option<&mut Vec<usize>>, c: char, source: usize) {
    out.push(c);
    if let Some(map) = map.as_deref_mut() {
        map.push(source);
    }
}

/// Single pass over `raw`. `map`, when given, receives one entry per char
/// pushed to the returned string.
fn canonicalize(raw: &str, mut map: Option<&mut Vec<usize>>) -> String {
    let mut out = String::with_capacity(raw.len());
    // Source index of the first char of the current whitespace run.
    let mut pending_space: Option<usize> = None;
    let mut chars = raw.chars().enumerate().peekable();

    while let Some((i, c)) = chars.next() {
        match classify(c) {
            CharClass::Drop => {}
            CharClass::Space => {
                pending_space.get_or_insert(i);
            }
            CharClass::Newline => {
                if c == '\r' && chars.peek().is_some_and(|&(_, next)| next == '\n') {
                    chars.next();
                }
                pending_space = None;
                if !out.is_empty() {
                    push(&mut out, &mut map, '\n', i);
                }
            }
            CharClass::Emit(ch) => {
                if let Some(at) = pending_space.take() {
                    if !out.is_empty() && !out.ends_with('\n') {
                        push(&mut out, &mut map, ' ', at);
                    }
                }
                push(&mut out, &mut map, ch, i);
            }
        }
    }

    // Trailing spaces were never emitted; trailing newlines were.
    while out.ends_with('\n') {
        out.pop();
        if let Some(map) = map.as_deref_mut() {
            map.pop();
        }
    }

    out
}
