//! Findings → anchors → queued edits.
//!
//! Each finding becomes one job on the mutation queue. The job resolves the
//! finding's anchor against the document as it is when the job runs, then
//! applies the finding's replacement, if any. Findings with offsets are
//! submitted latest-offset first so an applied edit never shifts a finding
//! that is still waiting.

use std::cmp::Reverse;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::AnchorConfig;
use crate::error::{AnchorError, AnchorResult};
use crate::host::{HostRange, MutableHost};
use crate::normalize::{normalize, normalize_for_search};
use crate::pending::PendingRegistry;
use crate::queue::MutationQueue;
use crate::search::{find_anchors, select_nth};
use crate::types::{Finding, Severity, Span};

/// What happened to one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AnchorOutcome {
    /// Located and replaced; `span` is the range before the edit.
    Applied { span: Span },
    /// Located; the finding carries no replacement.
    Located { span: Span },
    NotFound,
    Failed { error: String },
}

/// Per-finding report, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingReport {
    pub index: usize,
    pub rule_id: String,
    pub severity: Severity,
    pub snippet: String,
    #[serde(flatten)]
    pub outcome: AnchorOutcome,
}

/// Resolve and apply every finding through `queue`.
///
/// A failing finding is reported as [`AnchorOutcome::Failed`] and does not
/// stop the others.
///
/// # Errors
///
/// Returns [`AnchorError::TornDown`] if teardown already fired.
pub async fn apply_findings<H>(
    host: Arc<H>,
    findings: &[Finding],
    queue: &MutationQueue,
    registry: &Arc<PendingRegistry>,
    config: &AnchorConfig,
) -> AnchorResult<Vec<FindingReport>>
where
    H: MutableHost + 'static,
{
    if registry.is_torn_down() {
        return Err(AnchorError::TornDown);
    }

    let mut order: Vec<usize> = (0..findings.len()).collect();
    order.sort_by_key(|&i| Reverse(findings[i].offsets.map(|s| s.start)));

    let mut pending = Vec::with_capacity(order.len());
    for index in order {
        let host = Arc::clone(&host);
        let finding = findings[index].clone();
        let config = config.clone();
        let registry = Arc::clone(registry);
        let job = queue.enqueue(async move {
            resolve_and_apply(host.as_ref(), &finding, &config, &registry).await
        });
        pending.push((index, job));
    }

    let mut reports = Vec::with_capacity(pending.len());
    for (index, job) in pending {
        let settled = job.await.map_err(AnchorError::from).and_then(|result| result);
        let outcome = match settled {
            Ok(outcome) => outcome,
            Err(e) => AnchorOutcome::Failed {
                error: e.to_string(),
            },
        };
        let finding = &findings[index];
        debug!(index, rule = finding.rule_id, ?outcome, "finding settled");
        reports.push(FindingReport {
            index,
            rule_id: finding.rule_id.clone(),
            severity: finding.severity,
            snippet: finding.snippet.clone(),
            outcome,
        });
    }
    reports.sort_by_key(|r| r.index);

    let applied = reports
        .iter()
        .filter(|r| matches!(r.outcome, AnchorOutcome::Applied { .. }))
        .count();
    info!(findings = reports.len(), applied, "findings processed");
    Ok(reports)
}

async fn resolve_and_apply<H>(
    host: &H,
    finding: &Finding,
    config: &AnchorConfig,
    registry: &PendingRegistry,
) -> AnchorResult<AnchorOutcome>
where
    H: MutableHost + ?Sized,
{
    if registry.is_torn_down() {
        return Err(AnchorError::TornDown);
    }

    let Some(range) = locate(host, finding, config).await? else {
        return Ok(AnchorOutcome::NotFound);
    };
    let span = range.span();

    let Some(replacement) = finding.replacement.as_deref() else {
        return Ok(AnchorOutcome::Located { span });
    };
    host.replace_range(&range, replacement).await?;
    host.sync().await?;
    Ok(AnchorOutcome::Applied { span })
}

/// Pick the anchor a finding refers to.
///
/// With several disjoint anchors and canonical offsets, the occurrence index
/// of the offsets in the canonical document selects the anchor. If the
/// canonical and host occurrence counts disagree, the anchor nearest the
/// offsets' raw position wins; this assumes host spans are raw char indices.
pub async fn locate<H>(
    host: &H,
    finding: &Finding,
    config: &AnchorConfig,
) -> AnchorResult<Option<H::Range>>
where
    H: MutableHost + ?Sized,
{
    let anchors = find_anchors(host, &finding.snippet, config).await?;
    let Some(offsets) = finding.offsets else {
        return Ok(anchors.into_iter().next());
    };
    if anchors.len() <= 1 {
        return Ok(anchors.into_iter().next());
    }

    let document = normalize(host.text().await?.as_str());
    let needle = normalize_for_search(&finding.snippet);
    let starts = occurrence_starts(document.text(), &needle);

    if starts.len() == anchors.len() {
        let n = starts.iter().take_while(|&&s| s < offsets.start).count();
        return Ok(select_nth(anchors, n));
    }

    debug!(
        canonical = starts.len(),
        host = anchors.len(),
        "occurrence counts differ, picking nearest anchor"
    );
    let target = document
        .raw_span(offsets)
        .map_or(offsets.start, |raw| raw.start);
    Ok(anchors
        .into_iter()
        .min_by_key(|a| a.span().start.abs_diff(target)))
}

/// Char index of each non-overlapping occurrence of `needle` in `text`.
fn occurrence_starts(text: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let mut chars = 0;
    let mut last = 0;
    text.match_indices(needle)
        .map(|(byte, _)| {
            chars += text[last..byte].chars().count();
            last = byte;
            chars
        })
        .collect()
}
