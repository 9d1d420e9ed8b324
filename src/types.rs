//! Shared value types: spans and findings.

use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` range of char indices.
///
/// A span carries no record of its coordinate space (raw, canonical or
/// host); translate through an offset map before mixing spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if the two spans share at least one index.
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Severity assigned by the analysis pass. Not interpreted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    #[default]
    Warning,
    Info,
    /// Any label the analysis pass uses beyond the three above.
    #[serde(other)]
    Other,
}

/// A finding produced by the analysis collaborator.
///
/// Only `snippet`, `offsets` and `replacement` are read; the rest is carried
/// through to reports untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub snippet: String,
    /// Span in the canonical text the analysis ran over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<Span>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub rule_id: String,
    /// Text to put in place of the snippet, if the finding proposes an edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_overlap() {
        let a = Span::new(0, 5);
        assert!(a.overlaps(&Span::new(4, 8)));
        assert!(!a.overlaps(&Span::new(5, 8)));
        assert!(!Span::new(3, 3).overlaps(&a));
        assert_eq!(a.len(), 5);
        assert!(Span::new(4, 2).is_empty());
    }

    #[test]
    fn test_finding_parsing() {
        let json = r#"{
            "snippet": "teh",
            "offsets": {"start": 4, "end": 7},
            "severity": "error",
            "ruleId": "spelling"
        }"#;
        let finding: Finding = serde_json::from_str(json).expect("should parse finding");
        assert_eq!(finding.offsets, Some(Span::new(4, 7)));
        assert_eq!(finding.severity, Severity::Error);
        assert_eq!(finding.rule_id, "spelling");
        assert_eq!(finding.replacement, None);
    }

    #[test]
    fn test_finding_minimal() {
        let finding: Finding =
            serde_json::from_str(r#"{"snippet": "x"}"#).expect("should parse finding");
        assert_eq!(finding.severity, Severity::Warning);
        assert!(finding.offsets.is_none());
    }

    #[test]
    fn test_unknown_severity_accepted() {
        let finding: Finding = serde_json::from_str(r#"{"snippet": "x", "severity": "critical"}"#)
            .expect("should parse finding");
        assert_eq!(finding.severity, Severity::Other);
        assert_eq!(finding.snippet, "x");
    }
}
