//! Unified diff of a document before and after edits, via `similar`.

use similar::{Algorithm, ChangeTag, TextDiff};

/// Unified diff between the original and edited body.
///
/// Myers keeps prose diffs tight; returns an empty string when nothing
/// changed.
pub fn document_diff(name: &str, before: &str, after: &str) -> String {
    if before == after {
        return String::new();
    }
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(before, after);

    diff.unified_diff()
        .context_radius(2)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string()
}

/// Number of lines removed and inserted.
pub fn changed_lines(before: &str, after: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(before, after);
    diff.iter_all_changes()
        .fold((0, 0), |(del, ins), change| match change.tag() {
            ChangeTag::Delete => (del + 1, ins),
            ChangeTag::Insert => (del, ins + 1),
            ChangeTag::Equal => (del, ins),
        })
}
