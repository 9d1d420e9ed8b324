//! Deterministic nth-occurrence selection.

use super::bounded_search;
use crate::config::AnchorConfig;
use crate::error::AnchorResult;
use crate::host::SearchHost;

/// Zero-based pick from a match sequence, in the order given.
pub fn select_nth<R>(matches: Vec<R>, n: usize) -> Option<R> {
    matches.into_iter().nth(n)
}

/// Search once and return the match at index `n` in host order.
///
/// Uses the configured nth-match options (case-insensitive, substring by
/// default). No re-sorting or deduplication; run [`super::find_anchors`]
/// first when disjointness matters.
pub async fn search_nth<H>(
    host: &H,
    needle: &str,
    n: usize,
    config: &AnchorConfig,
) -> AnchorResult<Option<H::Range>>
where
    H: SearchHost + ?Sized,
{
    let matches = bounded_search(host, needle, config.nth_options(), config)
        .await?
        .into_matches();
    Ok(select_nth(matches, n))
}
