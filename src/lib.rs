//! `oa-anchor`: relocate analysis findings in a live document.
//!
//! An analysis pass runs over a canonical copy of a document and reports
//! findings as snippets plus canonical offsets. The live document keeps its
//! curly quotes, non-breaking spaces, zero-width joiners and CRLF line ends,
//! so a plain substring search often misses. This crate resolves findings to
//! disjoint ranges in the live document and applies edits one at a time.
//!
//! # Pieces
//!
//! - [`normalize`]: canonical text plus a canonical → raw offset map
//! - [`search`]: bounded host search, anchor resolution, nth-match selection
//! - [`queue`]: single-flight mutation lane
//! - [`pending`]: registry of cancellable operations and teardown
//! - [`apply`]: findings → anchors → queued edits
//!
//! # Architecture
//!
//! ```text
//! Finding ─→ find_anchors ─→ bounded_search ─→ SearchHost::search
//!               │ (exact, then normalized; prune overlaps)
//!               ↓
//!          select_nth ─→ MutationQueue ─→ MutableHost::replace_range + sync
//!                            ↑
//!                     PendingRegistry (cancel_all on teardown)
//! ```

pub mod apply;
pub mod config;
pub mod error;
pub mod host;
pub mod normalize;
pub mod pending;
pub mod queue;
pub mod search;
pub mod types;
pub mod util;

pub use config::AnchorConfig;
pub use error::{AnchorError, AnchorResult, HostError, QueueError};
pub use types::{Finding, Severity, Span};
