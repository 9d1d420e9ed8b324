//! Anchor resolution: exact search, normalized fallback, overlap pruning.
//!
//! Needles over the search ceiling cannot be found in one host call. They are
//! located with two probes instead, one on a fixed-size prefix and one on a
//! fixed-size suffix, and the two hits are joined into a single range.

use tracing::debug;

use super::{bounded_search, utf16_len};
use crate::config::AnchorConfig;
use crate::error::AnchorResult;
use crate::host::{HostRange, SearchHost, SearchOptions};
use crate::normalize::normalize_for_search;

/// Locate `snippet` in the host document.
///
/// Returns pairwise-disjoint ranges in document order. An empty result means
/// "not found" and is not an error; fatal host errors propagate.
pub async fn find_anchors<H>(
    host: &H,
    snippet: &str,
    config: &AnchorConfig,
) -> AnchorResult<Vec<H::Range>>
where
    H: SearchHost + ?Sized,
{
    if snippet.is_empty() {
        return Ok(Vec::new());
    }

    if utf16_len(snippet) > config.search_ceiling {
        let span = find_replacement_span(host, snippet, config).await?;
        return Ok(span.into_iter().collect());
    }

    let mut candidates = bounded_search(host, snippet, SearchOptions::EXACT, config)
        .await?
        .into_matches();

    if candidates.is_empty() {
        let normalized = normalize_for_search(snippet);
        if !normalized.is_empty() && normalized != snippet {
            debug!("exact search missed, retrying with normalized snippet");
            candidates = bounded_search(host, &normalized, SearchOptions::EXACT, config)
                .await?
                .into_matches();
        }
    }

    let found = candidates.len();
    let anchors = prune_overlaps(candidates);
    if anchors.len() < found {
        debug!(found, kept = anchors.len(), "pruned overlapping candidates");
    }
    Ok(anchors)
}

/// Reduce candidates to a disjoint, increasing sequence.
///
/// Candidates are stably sorted by start, so among equal starts the one the
/// host returned first comes first. A candidate is kept only if it starts at
/// or after the end of the last kept one.
pub fn prune_overlaps<R: HostRange>(mut candidates: Vec<R>) -> Vec<R> {
    candidates.sort_by_key(|r| r.span().start);

    let mut kept: Vec<R> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let clear = kept
            .last()
            .is_none_or(|last| candidate.span().start >= last.span().end);
        if clear {
            kept.push(candidate);
        }
    }
    kept
}

/// Locate a needle too long for one search call.
///
/// Probes the first `edge_probe` chars, then, if that hit anything, the last
/// `edge_probe` chars. The first prefix hit followed by a suffix hit is
/// joined into one range via [`SearchHost::expand_to`]. If the raw needle
/// cannot be placed, the probes are repeated on its normalized form.
pub async fn find_replacement_span<H>(
    host: &H,
    needle: &str,
    config: &AnchorConfig,
) -> AnchorResult<Option<H::Range>>
where
    H: SearchHost + ?Sized,
{
    let raw = needle.trim();
    if let Some(range) = probe_edges(host, raw, config).await? {
        return Ok(Some(range));
    }

    let normalized = normalize_for_search(needle);
    if normalized.is_empty() || normalized == raw {
        return Ok(None);
    }
    debug!("edge probes missed, retrying with normalized needle");
    probe_edges(host, &normalized, config).await
}

async fn probe_edges<H>(
    host: &H,
    needle: &str,
    config: &AnchorConfig,
) -> AnchorResult<Option<H::Range>>
where
    H: SearchHost + ?Sized,
{
    let chars: Vec<char> = needle.chars().collect();
    if chars.is_empty() {
        return Ok(None);
    }
    let probe = config.edge_probe.min(chars.len());
    let prefix: String = chars[..probe].iter().collect();
    let suffix: String = chars[chars.len() - probe..].iter().collect();

    let mut heads = bounded_search(host, &prefix, SearchOptions::EXACT, config)
        .await?
        .into_matches();
    if heads.is_empty() {
        debug!(needle_len = chars.len(), "prefix probe found nothing");
        return Ok(None);
    }
    heads.sort_by_key(|r| r.span().start);

    let mut tails = bounded_search(host, &suffix, SearchOptions::EXACT, config)
        .await?
        .into_matches();
    tails.sort_by_key(|r| r.span().start);

    for head in &heads {
        let head_span = head.span();
        let tail = tails.iter().find(|t| {
            let span = t.span();
            span.start >= head_span.start && span.end >= head_span.end
        });
        if let Some(tail) = tail {
            return Ok(Some(host.expand_to(head, tail)));
        }
    }

    debug!(heads = heads.len(), tails = tails.len(), "no suffix probe after a prefix hit");
    Ok(None)
}
