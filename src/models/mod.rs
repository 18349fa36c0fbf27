//! Data models for merge-bisect.
//!
//! This module contains the core data structures:
//! - `Revision` - One point on the first-parent history
//! - `Evaluation` - The result of running the oracle command on a revision
//! - `Verdict` / `VerdictMap` - Per-revision outcomes accumulated during a run

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An immutable descriptor of one historical point in the project's history.
///
/// Equality and hashing consider only the `identifier`; the remaining fields
/// are descriptive.
#[derive(Debug, Clone, Serialize)]
pub struct Revision {
    /// Commit time
    pub timestamp: DateTime<Utc>,
    /// Full commit hash
    pub identifier: String,
    /// Author name
    pub author: String,
    /// Subject line of the commit message
    pub summary: String,
}

impl Revision {
    /// Create a new revision descriptor.
    pub fn new(
        timestamp: DateTime<Utc>,
        identifier: impl Into<String>,
        author: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            identifier: identifier.into(),
            author: author.into(),
            summary: summary.into(),
        }
    }
}

impl PartialEq for Revision {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for Revision {}

impl Hash for Revision {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} \"{}\" \"{}\"",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.identifier,
            self.author,
            self.summary
        )
    }
}

/// Result of running the validation command against one revision.
///
/// `passed` is derived solely from the exit status. `output` holds the
/// captured stdout followed by stderr, or the launch error when the command
/// could not be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub passed: bool,
    pub output: String,
}

impl Evaluation {
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            passed: false,
            output: output.into(),
        }
    }

    /// The verdict this evaluation implies.
    pub fn verdict(&self) -> Verdict {
        Verdict::from_passed(self.passed)
    }
}

/// Outcome recorded for a revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    #[default]
    Unknown,
}

impl Verdict {
    pub fn from_passed(passed: bool) -> Self {
        if passed { Verdict::Pass } else { Verdict::Fail }
    }

    /// Label used in the final revision log.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "SUCCESS",
            Verdict::Fail => "FAILURE",
            Verdict::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// How a verdict was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictSource {
    /// The oracle ran on this revision
    Tested,
    /// Inferred from a tested neighbour under the monotonicity assumption
    Propagated,
}

/// One row of the verdict map.
#[derive(Debug, Clone, Serialize)]
pub struct VerdictEntry {
    pub revision: Revision,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<VerdictSource>,
}

/// Outcome per revision, kept in the same (oldest first) order as the
/// revision sequence it was built from.
#[derive(Debug, Clone, Default)]
pub struct VerdictMap {
    entries: Vec<VerdictEntry>,
}

impl VerdictMap {
    /// Create a map with every revision marked `Unknown`.
    pub fn new(revisions: &[Revision]) -> Self {
        Self {
            entries: revisions
                .iter()
                .map(|revision| VerdictEntry {
                    revision: revision.clone(),
                    verdict: Verdict::Unknown,
                    source: None,
                })
                .collect(),
        }
    }

    /// Record the verdict for the revision at `index` in the sequence.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn record(&mut self, index: usize, verdict: Verdict, source: VerdictSource) {
        let entry = &mut self.entries[index];
        debug_assert!(
            entry.verdict == Verdict::Unknown,
            "verdict for {} recorded twice",
            entry.revision.identifier
        );
        entry.verdict = verdict;
        entry.source = Some(source);
    }

    /// Look up the verdict for a revision identifier.
    pub fn get(&self, identifier: &str) -> Option<Verdict> {
        self.entries
            .iter()
            .find(|e| e.revision.identifier == identifier)
            .map(|e| e.verdict)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[VerdictEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when no revision is left `Unknown`.
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.verdict != Verdict::Unknown)
    }

    /// The chronologically earliest revision marked `Fail`.
    pub fn first_failing(&self) -> Option<&Revision> {
        self.entries
            .iter()
            .find(|e| e.verdict == Verdict::Fail)
            .map(|e| &e.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rev(id: &str) -> Revision {
        Revision::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            id,
            "Alice",
            "Merge pull request",
        )
    }

    #[test]
    fn test_revision_equality_uses_identifier_only() {
        let a = rev("abc");
        let mut b = rev("abc");
        b.author = "Bob".to_string();
        b.summary = "something else".to_string();
        assert_eq!(a, b);
        assert_ne!(a, rev("def"));
    }

    #[test]
    fn test_revision_display() {
        let r = rev("abc123");
        assert_eq!(
            r.to_string(),
            "2023-11-14 22:13:20 abc123 \"Alice\" \"Merge pull request\""
        );
    }

    #[test]
    fn test_evaluation_verdict() {
        let ok = Evaluation {
            passed: true,
            output: "ok".to_string(),
        };
        assert_eq!(ok.verdict(), Verdict::Pass);
        assert_eq!(Evaluation::failed("boom").verdict(), Verdict::Fail);
    }

    #[test]
    fn test_verdict_labels() {
        assert_eq!(Verdict::Pass.label(), "SUCCESS");
        assert_eq!(Verdict::Fail.label(), "FAILURE");
        assert_eq!(Verdict::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_verdict_map_starts_unknown() {
        let map = VerdictMap::new(&[rev("a"), rev("b")]);
        assert_eq!(map.len(), 2);
        assert!(!map.is_complete());
        assert_eq!(map.get("a"), Some(Verdict::Unknown));
        assert_eq!(map.get("missing"), None);
        assert!(map.first_failing().is_none());
    }

    #[test]
    fn test_verdict_map_record_and_first_failing() {
        let mut map = VerdictMap::new(&[rev("a"), rev("b"), rev("c")]);
        map.record(0, Verdict::Pass, VerdictSource::Tested);
        map.record(2, Verdict::Fail, VerdictSource::Tested);
        map.record(1, Verdict::Fail, VerdictSource::Propagated);

        assert!(map.is_complete());
        assert_eq!(map.first_failing().map(|r| r.identifier.as_str()), Some("b"));
        assert_eq!(map.entries()[1].source, Some(VerdictSource::Propagated));
    }

    #[test]
    fn test_verdict_entry_serializes_lowercase() {
        let mut map = VerdictMap::new(&[rev("a")]);
        map.record(0, Verdict::Pass, VerdictSource::Tested);
        let json = serde_json::to_string(&map.entries()[0]).unwrap();
        assert!(json.contains("\"verdict\":\"pass\""));
        assert!(json.contains("\"source\":\"tested\""));
    }
}
