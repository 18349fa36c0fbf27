//! The bisection controller.
//!
//! Given revisions ordered oldest first and an oracle, find the earliest
//! revision at which the oracle starts failing:
//!
//! 1. **Preconditions** - at least two revisions; the oldest must pass and the
//!    newest must fail.
//! 2. **Binary search** - repeatedly evaluate the midpoint of the undecided
//!    window. A pass marks everything earlier in the window as passing; a
//!    fail marks everything later as failing.
//! 3. **Extraction** - the answer is the earliest revision marked failing.
//!
//! Step 2 relies on outcomes being monotonic in time (pass, pass, ..., fail,
//! fail). This is not verified; a flaky or fixed-then-broken command gives a
//! meaningless answer.

use crate::models::{Revision, Verdict, VerdictMap, VerdictSource};
use crate::oracle::Oracle;
use crate::{Error, Result};
use std::ops::Range;

/// The contiguous run of revisions whose outcome is still undecided.
///
/// Indices refer to the full revision sequence. The window only ever shrinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchWindow {
    start: usize,
    end: usize,
}

impl SearchWindow {
    pub fn new(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end.max(range.start),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Index of the element at `floor(len / 2)`, favouring the earlier
    /// revision for even lengths.
    pub fn midpoint(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.start + self.len() / 2)
        }
    }

    /// Indices in the window before `index`.
    pub fn before(&self, index: usize) -> Range<usize> {
        self.start..index
    }

    /// Indices in the window after `index`.
    pub fn after(&self, index: usize) -> Range<usize> {
        index + 1..self.end
    }
}

/// Result of a completed bisection.
#[derive(Debug, Clone)]
pub struct BisectOutcome {
    /// The earliest failing revision
    pub bad_revision: Revision,
    /// Final outcome for every revision, oldest first
    pub verdicts: VerdictMap,
    /// Identifiers in the order the oracle ran on them
    pub evaluations: Vec<String>,
}

/// Run a bisection over `revisions` (oldest first).
///
/// # Errors
/// - `InsufficientHistory` if there are fewer than two revisions
/// - `NoGoodBaseline` if the oldest revision fails
/// - `NoBadTarget` if the newest revision passes
/// - any error returned by the oracle
pub fn bisect<O: Oracle>(revisions: &[Revision], oracle: &mut O) -> Result<BisectOutcome> {
    Bisection::new(revisions, oracle).run()
}

/// Phase 2: the earliest revision marked failing.
pub fn extract_bad_revision(verdicts: &VerdictMap) -> Result<&Revision> {
    verdicts.first_failing().ok_or(Error::NoTransitionFound)
}

/// State of one bisection run.
struct Bisection<'a, O: Oracle> {
    revisions: &'a [Revision],
    oracle: &'a mut O,
    verdicts: VerdictMap,
    evaluations: Vec<String>,
}

impl<'a, O: Oracle> Bisection<'a, O> {
    fn new(revisions: &'a [Revision], oracle: &'a mut O) -> Self {
        Self {
            revisions,
            oracle,
            verdicts: VerdictMap::new(revisions),
            evaluations: Vec::new(),
        }
    }

    fn run(mut self) -> Result<BisectOutcome> {
        let window = self.check_preconditions()?;
        self.search(window)?;

        debug_assert!(self.verdicts.is_complete());
        let bad_revision = extract_bad_revision(&self.verdicts)?.clone();
        tracing::info!(
            revision = %bad_revision.identifier,
            evaluations = self.evaluations.len(),
            "bisection complete"
        );

        Ok(BisectOutcome {
            bad_revision,
            verdicts: self.verdicts,
            evaluations: self.evaluations,
        })
    }

    /// Phase 0. Returns the window left between the two tested endpoints.
    fn check_preconditions(&mut self) -> Result<SearchWindow> {
        let count = self.revisions.len();
        if count < 2 {
            return Err(Error::InsufficientHistory { found: count });
        }

        let oldest = 0;
        let newest = count - 1;

        if self.evaluate(oldest)? == Verdict::Fail {
            return Err(Error::NoGoodBaseline {
                revision: self.revisions[oldest].to_string(),
            });
        }

        if self.evaluate(newest)? == Verdict::Pass {
            return Err(Error::NoBadTarget {
                revision: self.revisions[newest].to_string(),
            });
        }

        Ok(SearchWindow::new(oldest + 1..newest))
    }

    /// Phase 1.
    fn search(&mut self, mut window: SearchWindow) -> Result<()> {
        while let Some(mid) = window.midpoint() {
            tracing::debug!(window = ?window.range(), mid, "narrowing");

            window = match self.evaluate(mid)? {
                Verdict::Pass => {
                    self.propagate(window.before(mid), Verdict::Pass);
                    SearchWindow::new(window.after(mid))
                }
                _ => {
                    self.propagate(window.after(mid), Verdict::Fail);
                    SearchWindow::new(window.before(mid))
                }
            };
        }
        Ok(())
    }

    fn evaluate(&mut self, index: usize) -> Result<Verdict> {
        let revisions = self.revisions;
        let revision = &revisions[index];
        let verdict = self.oracle.evaluate(revision)?.verdict();
        self.evaluations.push(revision.identifier.clone());
        self.verdicts.record(index, verdict, VerdictSource::Tested);
        Ok(verdict)
    }

    fn propagate(&mut self, range: Range<usize>, verdict: Verdict) {
        for index in range {
            self.verdicts.record(index, verdict, VerdictSource::Propagated);
        }
    }
}
