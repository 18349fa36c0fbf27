//! Rendering the result of a completed bisection.

use crate::bisect::BisectOutcome;
use crate::commands::CommandResult;
use crate::models::{Revision, VerdictEntry, VerdictSource};
use serde::Serialize;
use std::fmt::Write;

/// A completed run, ready to be printed.
#[derive(Debug, Clone)]
pub struct BisectReport {
    /// The validation command that was run
    pub command: String,
    /// Width of the search window in days
    pub days: u32,
    pub outcome: BisectOutcome,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    command: &'a str,
    days: u32,
    bad_revision: &'a Revision,
    evaluations: &'a [String],
    /// Newest first, matching the human table
    revisions: Vec<&'a VerdictEntry>,
}

impl BisectReport {
    pub fn new(command: impl Into<String>, days: u32, outcome: BisectOutcome) -> Self {
        Self {
            command: command.into(),
            days,
            outcome,
        }
    }

    fn newest_first(&self) -> impl Iterator<Item = &VerdictEntry> {
        self.outcome.verdicts.entries().iter().rev()
    }
}

impl CommandResult for BisectReport {
    fn to_json(&self) -> String {
        let report = JsonReport {
            command: &self.command,
            days: self.days,
            bad_revision: &self.outcome.bad_revision,
            evaluations: &self.outcome.evaluations,
            revisions: self.newest_first().collect(),
        };
        serde_json::to_string(&report).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
    }

    fn to_human(&self) -> String {
        let mut out = String::new();
        writeln!(out).ok();
        writeln!(out, "Done").ok();
        writeln!(out).ok();
        writeln!(out, "Revision log (newest first):").ok();
        for entry in self.newest_first() {
            let inferred = if entry.source == Some(VerdictSource::Propagated) {
                " (inferred)"
            } else {
                ""
            };
            writeln!(
                out,
                "{}: {}{}",
                entry.verdict.label(),
                entry.revision,
                inferred
            )
            .ok();
        }
        writeln!(out).ok();
        write!(out, "BAD REVISION: {}", self.outcome.bad_revision).ok();
        out
    }
}
