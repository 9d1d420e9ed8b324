//! Host capability traits.
//!
//! A host is the live rich-text document. The resolver needs only a narrow
//! slice of it: a search primitive that returns ranges, a way to join two
//! ranges, and a `sync` that flushes queued host calls. Editing hosts add
//! text access and range replacement.
//!
//! [`memory::MemoryHost`] implements both traits over an in-memory string.

pub mod memory;

use async_trait::async_trait;

use crate::error::HostError;
use crate::types::Span;

/// Flags passed to the host search primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub match_case: bool,
    pub match_whole_word: bool,
}

impl SearchOptions {
    /// Case-sensitive, substring match. Used for anchor resolution.
    pub const EXACT: Self = Self {
        match_case: true,
        match_whole_word: false,
    };
}

/// A range handle returned by the host, with its position in host coordinates.
pub trait HostRange: Clone + Send + Sync + std::fmt::Debug {
    fn span(&self) -> Span;
}

/// Read-only host surface used by search and anchor resolution.
#[async_trait]
pub trait SearchHost: Send + Sync {
    type Range: HostRange;

    /// Search the document body. Results are loaded and in document order as
    /// the host reports them.
    async fn search(
        &self,
        needle: &str,
        options: SearchOptions,
    ) -> Result<Vec<Self::Range>, HostError>;

    /// Range from the start of `first` to the end of `last`.
    fn expand_to(&self, first: &Self::Range, last: &Self::Range) -> Self::Range;

    /// Flush queued host calls. Awaited after every mutating call.
    async fn sync(&self) -> Result<(), HostError>;
}

/// Host surface needed to apply edits.
#[async_trait]
pub trait MutableHost: SearchHost {
    /// Current body text, in the same coordinates as [`HostRange::span`].
    async fn text(&self) -> Result<String, HostError>;

    /// Replace the contents of `range` with `text`.
    async fn replace_range(&self, range: &Self::Range, text: &str) -> Result<(), HostError>;
}
