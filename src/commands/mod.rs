//! Command implementation for merge-bisect.
//!
//! `run` wires the pieces together: the workspace guard wraps the whole run,
//! the revision list is built once, and the controller drives the shell
//! oracle over it.

use crate::bisect::bisect;
use crate::config::BisectConfig;
use crate::git::{Git, RevisionSource};
use crate::guard::{self, WorkspaceGuard};
use crate::models::Revision;
use crate::oracle::ShellOracle;
use crate::report::BisectReport;
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait CommandResult {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Bisect the repository at `config.repo_path`.
///
/// The working tree is returned to its original branch (or detached commit)
/// before this function returns, whatever the outcome.
pub fn run(config: &BisectConfig) -> Result<BisectReport> {
    let git = Git::open(&config.repo_path)?;
    let guard = WorkspaceGuard::acquire(&git)?;

    let result = bisect_in(&git, config);
    let restored = guard.release();

    match (result, restored) {
        (Ok(report), Ok(())) => Ok(report),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(restore_err)) => {
            tracing::warn!(error = %restore_err, "failed to restore original position");
            eprintln!(
                "merge-bisect: warning: could not restore the original checkout: {}",
                restore_err
            );
            Err(e)
        }
    }
}

fn bisect_in(git: &Git, config: &BisectConfig) -> Result<BisectReport> {
    let progress = config.progress();

    let revisions = collect_revisions(git, config.window())?;
    tracing::info!(count = revisions.len(), days = config.days, "listed revisions");
    progress.emit(&format!("Found {} revisions", revisions.len()));
    progress.emit("");

    let mut oracle = ShellOracle::new(git, config.command.as_str(), &config.repo_path)
        .verbose(config.verbose)
        .timeout(config.timeout)
        .progress(progress);

    let outcome = bisect(&revisions, &mut oracle)?;
    Ok(BisectReport::new(config.command.as_str(), config.days, outcome))
}

/// List the candidate revisions, unless the listing was cut short by Ctrl-C.
fn collect_revisions<S: RevisionSource>(
    source: &S,
    window: chrono::Duration,
) -> Result<Vec<Revision>> {
    let revisions = source.list_revisions(window);
    if guard::interrupted() {
        return Err(Error::Interrupted);
    }
    Ok(revisions)
}
